//! Module interfaces
//!
//! Each computational step of the simulator shall implement the `State`
//! trait. A step is pure with respect to shared state: it receives a copy of
//! its inputs and returns its outputs, it never touches a lock itself.

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// The module's internal state.
pub trait State {
    /// Data required for cyclic processing.
    type InputData;
    /// Data produced by cyclic processing.
    type OutputData;
    /// An error which can occur during cyclic processing.
    type ProcError;

    /// Main module processing function.
    ///
    /// # Inputs
    /// - `input_data`: The data required for processing by the module.
    ///
    /// # Outputs
    /// - On success the output data.
    /// - On error a `ProcError` instance.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<Self::OutputData, Self::ProcError>;
}
