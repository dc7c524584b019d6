//! Command definitions
//!
//! The closed catalog of server functions, and the immutable `Command`
//! built from one of them for a single round trip.

use std::fmt;
use std::str::FromStr;

use crate::error::{DacError, Result};

/// How the reply to a command is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFamily {
    /// Any non-empty payload is true
    Truthy,
    /// True only when the payload equals the configured stop phrase
    StopPhrase,
    /// True only when the payload starts with the configured done prefix
    DonePrefix,
    /// A single decimal number
    Number,
    /// Space-separated decimal numbers
    Numbers,
    /// `\r\n`-separated names
    List,
    /// Space-separated fields: a number followed by `n - 1` strings
    Fields(usize),
    /// Header line followed by tab-separated integers
    TextArray,
    /// Header line followed by big-endian i32 values
    BinaryArray,
    /// Trimmed text, no further interpretation
    Text,
    /// Untouched bytes
    Raw,
}

/// Server function names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    AtPreset,
    AtTrajectory,
    DisableBreakpoints,
    DisableMotor,
    EnableMotor,
    GetFlyingPositions,
    GetFreerun,
    GetInstrumentAcquired1D,
    GetInstrumentAcquired2D,
    GetInstrumentAcquired3D,
    GetInstrumentStatus,
    GetMotor,
    GetMotorPos,
    GetMotorStatus,
    GetMotorVelocity,
    GetSoftLimits,
    HomeMotor,
    ListAIs,
    ListDIOs,
    ListInstruments,
    ListMotors,
    MoveMotor,
    MoveToTrajectory,
    StartInstrumentAcquire,
    StopMotor,
}

impl CommandName {
    /// Every known command, in wire-name order
    pub const ALL: [CommandName; 25] = [
        CommandName::AtPreset,
        CommandName::AtTrajectory,
        CommandName::DisableBreakpoints,
        CommandName::DisableMotor,
        CommandName::EnableMotor,
        CommandName::GetFlyingPositions,
        CommandName::GetFreerun,
        CommandName::GetInstrumentAcquired1D,
        CommandName::GetInstrumentAcquired2D,
        CommandName::GetInstrumentAcquired3D,
        CommandName::GetInstrumentStatus,
        CommandName::GetMotor,
        CommandName::GetMotorPos,
        CommandName::GetMotorStatus,
        CommandName::GetMotorVelocity,
        CommandName::GetSoftLimits,
        CommandName::HomeMotor,
        CommandName::ListAIs,
        CommandName::ListDIOs,
        CommandName::ListInstruments,
        CommandName::ListMotors,
        CommandName::MoveMotor,
        CommandName::MoveToTrajectory,
        CommandName::StartInstrumentAcquire,
        CommandName::StopMotor,
    ];

    /// Name as it appears on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::AtPreset => "AtPreset",
            CommandName::AtTrajectory => "AtTrajectory",
            CommandName::DisableBreakpoints => "DisableBreakpoints",
            CommandName::DisableMotor => "DisableMotor",
            CommandName::EnableMotor => "EnableMotor",
            CommandName::GetFlyingPositions => "GetFlyingPositions",
            CommandName::GetFreerun => "GetFreerun",
            CommandName::GetInstrumentAcquired1D => "GetInstrumentAcquired1D",
            CommandName::GetInstrumentAcquired2D => "GetInstrumentAcquired2D",
            CommandName::GetInstrumentAcquired3D => "GetInstrumentAcquired3D",
            CommandName::GetInstrumentStatus => "GetInstrumentStatus",
            CommandName::GetMotor => "GetMotor",
            CommandName::GetMotorPos => "GetMotorPos",
            CommandName::GetMotorStatus => "GetMotorStatus",
            CommandName::GetMotorVelocity => "GetMotorVelocity",
            CommandName::GetSoftLimits => "GetSoftLimits",
            CommandName::HomeMotor => "HomeMotor",
            CommandName::ListAIs => "ListAIs",
            CommandName::ListDIOs => "ListDIOs",
            CommandName::ListInstruments => "ListInstruments",
            CommandName::ListMotors => "ListMotors",
            CommandName::MoveMotor => "MoveMotor",
            CommandName::MoveToTrajectory => "MoveToTrajectory",
            CommandName::StartInstrumentAcquire => "StartInstrumentAcquire",
            CommandName::StopMotor => "StopMotor",
        }
    }

    /// Number of parameters the server expects
    pub fn arity(self) -> usize {
        match self {
            CommandName::ListAIs
            | CommandName::ListDIOs
            | CommandName::ListInstruments
            | CommandName::ListMotors => 0,
            CommandName::MoveMotor | CommandName::StartInstrumentAcquire => 2,
            _ => 1,
        }
    }

    /// Decoder family for the reply
    pub fn family(self) -> ResponseFamily {
        match self {
            CommandName::AtPreset
            | CommandName::AtTrajectory
            | CommandName::DisableBreakpoints
            | CommandName::DisableMotor
            | CommandName::EnableMotor
            | CommandName::MoveMotor => ResponseFamily::Truthy,
            CommandName::StopMotor => ResponseFamily::StopPhrase,
            CommandName::GetMotorStatus => ResponseFamily::DonePrefix,
            CommandName::GetFreerun | CommandName::GetMotorPos | CommandName::GetMotorVelocity => {
                ResponseFamily::Number
            }
            CommandName::GetSoftLimits => ResponseFamily::Numbers,
            CommandName::GetMotor => ResponseFamily::Fields(3),
            CommandName::ListAIs
            | CommandName::ListDIOs
            | CommandName::ListInstruments
            | CommandName::ListMotors
            | CommandName::GetInstrumentStatus => ResponseFamily::List,
            CommandName::GetInstrumentAcquired1D | CommandName::GetInstrumentAcquired2D => {
                ResponseFamily::TextArray
            }
            CommandName::GetInstrumentAcquired3D => ResponseFamily::BinaryArray,
            CommandName::HomeMotor
            | CommandName::MoveToTrajectory
            | CommandName::StartInstrumentAcquire => ResponseFamily::Text,
            CommandName::GetFlyingPositions => ResponseFamily::Raw,
        }
    }

    /// Whether the command changes hardware state
    ///
    /// `StopMotor` is deliberately absent: halting motion is always allowed.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            CommandName::DisableBreakpoints
                | CommandName::DisableMotor
                | CommandName::EnableMotor
                | CommandName::HomeMotor
                | CommandName::MoveMotor
                | CommandName::MoveToTrajectory
                | CommandName::StartInstrumentAcquire
        )
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = DacError;

    fn from_str(s: &str) -> Result<Self> {
        CommandName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| DacError::InvalidCommand(format!("unknown command name: {}", s)))
    }
}

/// A single command parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Param {
    /// Parse a parameter from free text (CLI input)
    ///
    /// Integers win over floats; anything else is text. A number is only
    /// taken when it prints back exactly as typed, so `007`, `1e3` or `nan`
    /// go out on the wire unchanged.
    pub fn parse(s: &str) -> Param {
        match (s.parse::<i64>(), s.parse::<f64>()) {
            (Ok(i), _) if i.to_string() == s => Param::Int(i),
            (_, Ok(f)) if f.is_finite() && f.to_string() == s => Param::Float(f),
            _ => Param::Text(s.to_string()),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Param::Int(_) => Ok(()),
            Param::Float(f) if f.is_finite() => Ok(()),
            Param::Float(f) => Err(DacError::InvalidCommand(format!(
                "non-finite float parameter: {}",
                f
            ))),
            Param::Text(s) => {
                if s.is_empty() {
                    return Err(DacError::InvalidCommand(
                        "empty text parameter".to_string(),
                    ));
                }
                match s.chars().find(|c| matches!(c, ',' | '(' | ')' | '\r' | '\n')) {
                    Some(c) => Err(DacError::InvalidCommand(format!(
                        "text parameter {:?} contains wire delimiter {:?}",
                        s, c
                    ))),
                    None if !s.is_ascii() => Err(DacError::InvalidCommand(format!(
                        "text parameter {:?} is not ASCII",
                        s
                    ))),
                    None => Ok(()),
                }
            }
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(i) => write!(f, "{}", i),
            // Rust's float Display is locale-independent, never uses an
            // exponent and prints the shortest round-tripping digits.
            Param::Float(v) => write!(f, "{}", v),
            Param::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v.into())
    }
}

impl From<u32> for Param {
    fn from(v: u32) -> Self {
        Param::Int(v.into())
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

/// A validated request, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: CommandName,
    params: Vec<Param>,
}

impl Command {
    /// Build a command, checking arity and parameter text
    pub fn new(name: CommandName, params: Vec<Param>) -> Result<Self> {
        if params.len() != name.arity() {
            return Err(DacError::InvalidCommand(format!(
                "{} takes {} parameter(s), got {}",
                name,
                name.arity(),
                params.len()
            )));
        }
        for param in &params {
            param.validate()?;
        }
        Ok(Self { name, params })
    }

    /// Build a zero-parameter command
    pub fn nullary(name: CommandName) -> Result<Self> {
        Self::new(name, Vec::new())
    }

    /// Build a one-parameter command
    pub fn unary(name: CommandName, target: impl Into<Param>) -> Result<Self> {
        Self::new(name, vec![target.into()])
    }

    /// Build a two-parameter command
    pub fn binary(
        name: CommandName,
        target: impl Into<Param>,
        value: impl Into<Param>,
    ) -> Result<Self> {
        Self::new(name, vec![target.into(), value.into()])
    }

    pub fn name(&self) -> CommandName {
        self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}
