/// Opaque value threaded unchanged through every call the machine makes to
/// its trace callback during one `reduce`/`reduce_with_budget` run. The
/// machine never inspects it; it exists purely for the caller to correlate
/// a run's trace events (e.g. with a request id or a test case name).
pub type TraceCookie = u64;

/// One of the eleven transition rule labels, in spec order: `'1'`..`'9'`
/// for rules 1-9, `'A'`/`'B'` for rules 10 and 11.
pub type StepLabel = char;

/// Called once per successful transition, in strict step order, with the
/// 0-based step index and the label of the rule that just fired.
pub trait Trace {
    fn record(&mut self, step : usize, label : StepLabel, cookie : TraceCookie);
}

impl<F : FnMut(usize, StepLabel, TraceCookie)> Trace for F {
    fn record(&mut self, step : usize, label : StepLabel, cookie : TraceCookie) {
        (self)(step, label, cookie)
    }
}

/// A `Trace` that records nothing, for callers that don't want a trace.
pub struct NullTrace;

impl Trace for NullTrace {
    fn record(&mut self, _step : usize, _label : StepLabel, _cookie : TraceCookie) {}
}
