use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Which strategy entry point was being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCall {
    Instantiate,
    Move,
    Fight,
    Eat,
    Color,
    Glyph,
}

impl fmt::Display for StrategyCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyCall::Instantiate => "instantiate",
            StrategyCall::Move => "move",
            StrategyCall::Fight => "fight",
            StrategyCall::Eat => "eat",
            StrategyCall::Color => "color",
            StrategyCall::Glyph => "glyph",
        };
        f.write_str(name)
    }
}

/// Why a strategy call was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyFault {
    /// The strategy returned an error or an out-of-contract value.
    Error { message: String },
    /// The strategy panicked.
    Panic { message: String },
    /// The call ran past its latency budget. Any result it produced is
    /// discarded.
    Timeout { elapsed_ms: u64, budget_ms: u64 },
}

impl fmt::Display for StrategyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyFault::Error { message } => write!(f, "error: {}", message),
            StrategyFault::Panic { message } => write!(f, "panicked: {}", message),
            StrategyFault::Timeout {
                elapsed_ms,
                budget_ms,
            } => write!(f, "took {}ms (budget {}ms)", elapsed_ms, budget_ms),
        }
    }
}

impl std::error::Error for StrategyFault {}

/// Runs strategy code so that errors, panics, and overruns come back as a
/// [`StrategyFault`] instead of escaping into the tick.
#[derive(Debug, Clone, Copy)]
pub struct Sandbox {
    budget: Duration,
}

impl Sandbox {
    pub fn new(budget: Duration) -> Self {
        Sandbox { budget }
    }

    /// Invoke `call`. A result that arrives after the budget is treated as
    /// a timeout even if it succeeded.
    pub fn call<T, F>(&self, call: F) -> Result<T, StrategyFault>
    where
        F: FnOnce() -> Result<T, String>,
    {
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(call));
        let elapsed = start.elapsed();

        if elapsed > self.budget {
            return Err(StrategyFault::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
                budget_ms: self.budget.as_millis() as u64,
            });
        }

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(StrategyFault::Error { message }),
            Err(payload) => Err(StrategyFault::Panic {
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
