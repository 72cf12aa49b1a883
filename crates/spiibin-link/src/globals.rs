//! Global REAL variable checks before a binary write.
//!
//! The controller has no "does this variable exist" query. Reading the
//! last element the write will touch answers it instead: a value means the
//! variable is large enough, error 1064 means it is undefined, and error
//! 1035 means it exists but is too small.

use spiibin_frame::{ArrayDescriptor, ArrayShape, ERROR_INDEX_OUT_OF_RANGE, ERROR_UNDEFINED_VARIABLE};
use spiibin_transport::ByteChannel;
use tracing::{debug, info};

use crate::error::{LinkError, Result};
use crate::link::Link;
use crate::write::WriteReport;

/// ASCII command access to the controller's variable space.
///
/// The ASCII command language is outside this crate; callers plug in
/// whatever drives it.
pub trait GlobalVariables {
    /// Send a query and return the response line without its terminator.
    fn query(&mut self, command: &str) -> Result<String>;

    /// Send a command that only acknowledges.
    fn execute(&mut self, command: &str) -> Result<()>;
}

impl<G: GlobalVariables + ?Sized> GlobalVariables for &mut G {
    fn query(&mut self, command: &str) -> Result<String> {
        (**self).query(command)
    }

    fn execute(&mut self, command: &str) -> Result<()> {
        (**self).execute(command)
    }
}

/// Outcome of [`ensure_global_real`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCheck {
    /// The variable exists and covers the descriptor.
    Exists,
    /// The variable was undefined and has been declared.
    Declared,
}

/// Make sure a global REAL variable can hold `descriptor`, declaring it if
/// it does not exist.
pub fn ensure_global_real<G: GlobalVariables + ?Sized>(
    vars: &mut G,
    descriptor: &ArrayDescriptor,
) -> Result<GlobalCheck> {
    let probe = probe_command(descriptor);
    let response = vars.query(&probe)?;
    debug!(command = %probe, %response, "global variable probe");

    let Some(code) = response_error(&probe, &response)? else {
        return Ok(GlobalCheck::Exists);
    };
    match code {
        ERROR_UNDEFINED_VARIABLE => {
            let declare = declare_command(descriptor);
            vars.execute(&declare)?;
            info!(command = %declare, "declared global variable");
            Ok(GlobalCheck::Declared)
        }
        ERROR_INDEX_OUT_OF_RANGE => Err(LinkError::VariableTooSmall {
            variable: descriptor.variable.clone(),
            descriptor: descriptor.to_string(),
        }),
        code => Err(LinkError::Command {
            command: probe,
            code,
        }),
    }
}

/// `?VAR(d1e)(d2e)`, `?VAR(d1e)` or `?VAR(0)` depending on shape.
pub fn probe_command(descriptor: &ArrayDescriptor) -> String {
    let var = &descriptor.variable;
    match descriptor.shape() {
        ArrayShape::TwoDimensional => {
            format!("?{var}({})({})", descriptor.dim1.end, descriptor.dim2.end)
        }
        ArrayShape::OneDimensional => format!("?{var}({})", descriptor.dim1.end),
        ArrayShape::Scalar => format!("?{var}(0)"),
    }
}

/// `global REAL VAR(n1)(n2)` sized to reach the descriptor's last index.
pub fn declare_command(descriptor: &ArrayDescriptor) -> String {
    let var = &descriptor.variable;
    let (n1, n2) = (
        u64::from(descriptor.dim1.end) + 1,
        u64::from(descriptor.dim2.end) + 1,
    );
    match descriptor.shape() {
        ArrayShape::TwoDimensional => format!("global REAL {var}({n1})({n2})"),
        ArrayShape::OneDimensional => format!("global REAL {var}({n1})"),
        ArrayShape::Scalar => format!("global REAL {var}"),
    }
}

/// Error number from an ASCII response of the form `?1064`.
fn response_error(command: &str, response: &str) -> Result<Option<u16>> {
    let Some(digits) = response.trim().strip_prefix('?') else {
        return Ok(None);
    };
    digits
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| LinkError::UnexpectedResponse {
            command: command.to_string(),
            response: response.to_string(),
        })
}

impl<C: ByteChannel> Link<C> {
    /// [`ensure_global_real`] followed by [`write_f64_array`](Link::write_f64_array).
    pub fn write_array_checked<G: GlobalVariables + ?Sized>(
        &mut self,
        vars: &mut G,
        descriptor: &ArrayDescriptor,
        values: &[f64],
    ) -> Result<WriteReport> {
        ensure_global_real(vars, descriptor)?;
        self.write_f64_array(descriptor, values)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use spiibin_transport::MemoryChannel;

    #[derive(Default)]
    struct Scripted {
        responses: VecDeque<String>,
        sent: Vec<String>,
    }

    impl Scripted {
        fn with(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(|r| r.to_string()).collect(),
                sent: Vec::new(),
            }
        }
    }

    impl GlobalVariables for Scripted {
        fn query(&mut self, command: &str) -> Result<String> {
            self.sent.push(command.to_string());
            Ok(self.responses.pop_front().unwrap_or_default())
        }

        fn execute(&mut self, command: &str) -> Result<()> {
            self.sent.push(command.to_string());
            Ok(())
        }
    }

    fn desc(d1: (u32, u32), d2: (u32, u32)) -> ArrayDescriptor {
        ArrayDescriptor::new("PROF")
            .expect("valid name")
            .dim1(d1.0, d1.1)
            .expect("valid range")
            .dim2(d2.0, d2.1)
            .expect("valid range")
    }

    #[test]
    fn probe_and_declare_commands() {
        let two = desc((0, 4), (0, 9));
        assert_eq!(probe_command(&two), "?PROF(4)(9)");
        assert_eq!(declare_command(&two), "global REAL PROF(5)(10)");

        let one = desc((0, 99), (0, 0));
        assert_eq!(probe_command(&one), "?PROF(99)");
        assert_eq!(declare_command(&one), "global REAL PROF(100)");

        let scalar = desc((0, 0), (0, 0));
        assert_eq!(probe_command(&scalar), "?PROF(0)");
        assert_eq!(declare_command(&scalar), "global REAL PROF");
    }

    #[test]
    fn existing_variable() {
        let mut vars = Scripted::with(&["0.25"]);
        let check = ensure_global_real(&mut vars, &desc((0, 99), (0, 0))).expect("check");
        assert_eq!(check, GlobalCheck::Exists);
        assert_eq!(vars.sent, vec!["?PROF(99)"]);
    }

    #[test]
    fn undefined_variable_is_declared() {
        let mut vars = Scripted::with(&["?1064"]);
        let check = ensure_global_real(&mut vars, &desc((0, 99), (0, 0))).expect("check");
        assert_eq!(check, GlobalCheck::Declared);
        assert_eq!(vars.sent, vec!["?PROF(99)", "global REAL PROF(100)"]);
    }

    #[test]
    fn undersized_variable() {
        let mut vars = Scripted::with(&["?1035"]);
        let err = ensure_global_real(&mut vars, &desc((0, 99), (0, 0))).unwrap_err();
        assert!(matches!(err, LinkError::VariableTooSmall { .. }));
        assert_eq!(vars.sent.len(), 1);
    }

    #[test]
    fn other_error_is_reported() {
        let mut vars = Scripted::with(&["?2012\r"]);
        let err = ensure_global_real(&mut vars, &desc((0, 99), (0, 0))).unwrap_err();
        assert_eq!(err.controller_code(), Some(2012));
    }

    #[test]
    fn garbled_error_response() {
        let mut vars = Scripted::with(&["?oops"]);
        let err = ensure_global_real(&mut vars, &desc((0, 9), (0, 0))).unwrap_err();
        assert!(matches!(err, LinkError::UnexpectedResponse { .. }));
    }

    #[test]
    fn checked_write_declares_then_writes() {
        let mut vars = Scripted::with(&["?1064"]);
        let mut channel = MemoryChannel::new();
        channel.push_reply(vec![0x06, 0xF2]);

        let mut link = Link::new(&mut channel);
        let report = link
            .write_array_checked(&mut vars, &desc((0, 2), (0, 0)), &[1.0, 2.0, 3.0])
            .expect("checked write");
        assert_eq!(report.packets, 1);
        assert_eq!(vars.sent[1], "global REAL PROF(3)");
        assert_eq!(channel.writes().len(), 1);
    }

    #[test]
    fn checked_write_stops_on_undersized_variable() {
        let mut vars = Scripted::with(&["?1035"]);
        let mut channel = MemoryChannel::new();

        let mut link = Link::new(&mut channel);
        assert!(link
            .write_array_checked(&mut vars, &desc((0, 2), (0, 0)), &[1.0, 2.0, 3.0])
            .is_err());
        assert!(channel.writes().is_empty());
    }
}
