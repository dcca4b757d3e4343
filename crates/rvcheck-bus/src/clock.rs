use thiserror::Error;

/// Errors raised by the time-advance primitive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("simulation exceeded the ceiling of {limit} cycles")]
    CycleLimit { limit: u64 },
}

/// Time-advance primitive of a simulated design.
///
/// A half cycle toggles the clock once and settles the design. Full cycles
/// are two half cycles. `eval` settles combinational logic without moving
/// time, for signals poked between edges.
pub trait Clocked {
    fn half_cycle(&mut self) -> Result<(), ClockError>;

    fn cycle(&mut self) -> Result<(), ClockError> {
        self.half_cycle()?;
        self.half_cycle()
    }

    fn eval(&mut self);
}
