//! Typed client
//!
//! One-line wrappers over `Session::send` for each server function. Each
//! method builds the command, runs one exchange and unpacks the decoded
//! value into a plain Rust type.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{DacError, Result};
use crate::network::Session;
use crate::protocol::{Array2, Command, CommandName, Param, Response, ResponseData};

/// Full reading of a motor from `GetMotor`
#[derive(Debug, Clone, PartialEq)]
pub struct MotorReading {
    pub position: f64,

    /// Status word as sent by the server (hex)
    pub status: String,

    /// Server timestamp, verbatim
    pub timestamp: String,
}

/// Names of every device the server exposes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub motors: Vec<String>,
    pub instruments: Vec<String>,
    pub analog_inputs: Vec<String>,
    pub digital_io: Vec<String>,
}

/// Cheaply cloneable handle over a shared `Session`
#[derive(Clone)]
pub struct Client {
    session: Arc<Session>,
}

impl Client {
    /// Create a client with its own session
    pub fn new(config: Config) -> Self {
        Self::from_session(Arc::new(Session::new(config)))
    }

    /// Wrap an existing session
    pub fn from_session(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Send any command by name
    pub fn send_raw(&self, name: CommandName, params: Vec<Param>) -> Result<Response> {
        self.session.send(&Command::new(name, params)?)
    }

    // =========================================================================
    // Device lists
    // =========================================================================

    pub fn list_motors(&self) -> Result<Vec<String>> {
        self.list(CommandName::ListMotors)
    }

    pub fn list_instruments(&self) -> Result<Vec<String>> {
        self.list(CommandName::ListInstruments)
    }

    pub fn list_analog_inputs(&self) -> Result<Vec<String>> {
        self.list(CommandName::ListAIs)
    }

    pub fn list_digital_io(&self) -> Result<Vec<String>> {
        self.list(CommandName::ListDIOs)
    }

    /// Refresh every device list
    ///
    /// Four sequential exchanges; other callers may interleave between them.
    pub fn inventory(&self) -> Result<Inventory> {
        Ok(Inventory {
            motors: self.list_motors()?,
            instruments: self.list_instruments()?,
            analog_inputs: self.list_analog_inputs()?,
            digital_io: self.list_digital_io()?,
        })
    }

    // =========================================================================
    // Motors
    // =========================================================================

    pub fn get_motor_pos(&self, motor: &str) -> Result<f64> {
        number(self.unary(CommandName::GetMotorPos, motor)?)
    }

    pub fn get_motor_velocity(&self, motor: &str) -> Result<f64> {
        number(self.unary(CommandName::GetMotorVelocity, motor)?)
    }

    pub fn get_motor(&self, motor: &str) -> Result<MotorReading> {
        let response = self.unary(CommandName::GetMotor, motor)?;
        match response.data() {
            ResponseData::Fields { value, rest } if rest.len() == 2 => Ok(MotorReading {
                position: *value,
                status: rest[0].clone(),
                timestamp: rest[1].clone(),
            }),
            _ => Err(unexpected(&response, "position, status and timestamp")),
        }
    }

    /// Whether the last move has finished
    pub fn get_motor_status(&self, motor: &str) -> Result<bool> {
        boolean(self.unary(CommandName::GetMotorStatus, motor)?)
    }

    /// `(low, high)` soft limits
    pub fn get_soft_limits(&self, motor: &str) -> Result<(f64, f64)> {
        let response = self.unary(CommandName::GetSoftLimits, motor)?;
        match response.data() {
            ResponseData::Numbers(values) if values.len() >= 2 => Ok((values[0], values[1])),
            _ => Err(unexpected(&response, "two limits")),
        }
    }

    pub fn move_motor(&self, motor: &str, position: f64) -> Result<bool> {
        let command = Command::binary(CommandName::MoveMotor, motor, position)?;
        boolean(self.session.send(&command)?)
    }

    /// Stop a motor; true only on the server's exact acknowledgement
    pub fn stop_motor(&self, motor: &str) -> Result<bool> {
        boolean(self.unary(CommandName::StopMotor, motor)?)
    }

    pub fn home_motor(&self, motor: &str) -> Result<String> {
        text(self.unary(CommandName::HomeMotor, motor)?)
    }

    pub fn enable_motor(&self, motor: &str) -> Result<bool> {
        boolean(self.unary(CommandName::EnableMotor, motor)?)
    }

    pub fn disable_motor(&self, motor: &str) -> Result<bool> {
        boolean(self.unary(CommandName::DisableMotor, motor)?)
    }

    pub fn at_preset(&self, preset: &str) -> Result<bool> {
        boolean(self.unary(CommandName::AtPreset, preset)?)
    }

    pub fn at_trajectory(&self, trajectory: &str) -> Result<bool> {
        boolean(self.unary(CommandName::AtTrajectory, trajectory)?)
    }

    pub fn move_to_trajectory(&self, trajectory: &str) -> Result<String> {
        text(self.unary(CommandName::MoveToTrajectory, trajectory)?)
    }

    pub fn disable_breakpoints(&self, motor: &str) -> Result<bool> {
        boolean(self.unary(CommandName::DisableBreakpoints, motor)?)
    }

    /// Raw bytes of a flying-scan position buffer
    pub fn get_flying_positions(&self, motor: &str) -> Result<Bytes> {
        let response = self.unary(CommandName::GetFlyingPositions, motor)?;
        Ok(response.payload().clone())
    }

    // =========================================================================
    // Analog inputs and instruments
    // =========================================================================

    /// Free-running value of an analog input
    pub fn get_freerun(&self, input: &str) -> Result<f64> {
        number(self.unary(CommandName::GetFreerun, input)?)
    }

    pub fn start_instrument_acquire(&self, instrument: &str, seconds: f64) -> Result<String> {
        let command = Command::binary(CommandName::StartInstrumentAcquire, instrument, seconds)?;
        text(self.session.send(&command)?)
    }

    pub fn get_instrument_status(&self, instrument: &str) -> Result<Vec<String>> {
        list(self.unary(CommandName::GetInstrumentStatus, instrument)?)
    }

    pub fn get_instrument_acquired_1d(&self, instrument: &str) -> Result<Array2> {
        array(self.unary(CommandName::GetInstrumentAcquired1D, instrument)?)
    }

    pub fn get_instrument_acquired_2d(&self, instrument: &str) -> Result<Array2> {
        array(self.unary(CommandName::GetInstrumentAcquired2D, instrument)?)
    }

    pub fn get_instrument_acquired_3d(&self, instrument: &str) -> Result<Array2> {
        array(self.unary(CommandName::GetInstrumentAcquired3D, instrument)?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn list(&self, name: CommandName) -> Result<Vec<String>> {
        list(self.session.send(&Command::nullary(name)?)?)
    }

    fn unary(&self, name: CommandName, target: &str) -> Result<Response> {
        self.session.send(&Command::unary(name, target)?)
    }
}

fn unexpected(response: &Response, wanted: &str) -> DacError {
    DacError::malformed(
        response.name(),
        format!("expected {}, decoded {:?}", wanted, response.data()),
        response.payload(),
    )
}

fn boolean(response: Response) -> Result<bool> {
    match response.data() {
        ResponseData::Bool(b) => Ok(*b),
        _ => Err(unexpected(&response, "a boolean")),
    }
}

fn number(response: Response) -> Result<f64> {
    match response.data() {
        ResponseData::Number(n) => Ok(*n),
        _ => Err(unexpected(&response, "a number")),
    }
}

fn text(response: Response) -> Result<String> {
    match response.into_parts() {
        (_, _, ResponseData::Text(s)) => Ok(s),
        (name, payload, data) => Err(DacError::malformed(
            name,
            format!("expected text, decoded {:?}", data),
            &payload,
        )),
    }
}

fn list(response: Response) -> Result<Vec<String>> {
    match response.into_parts() {
        (_, _, ResponseData::List(items)) => Ok(items),
        (name, payload, data) => Err(DacError::malformed(
            name,
            format!("expected a list, decoded {:?}", data),
            &payload,
        )),
    }
}

fn array(response: Response) -> Result<Array2> {
    match response.into_parts() {
        (_, _, ResponseData::Array(array)) => Ok(array),
        (name, payload, data) => Err(DacError::malformed(
            name,
            format!("expected an array, decoded {:?}", data),
            &payload,
        )),
    }
}
