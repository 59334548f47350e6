use crate::types::RequestInput;

/// Who is calling and with what parameters. Passed explicitly to every
/// orchestrator operation; nothing is read from ambient state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub tenant_id: Option<i64>,
    pub principal_id: Option<i64>,
    pub input: RequestInput,
}

impl RequestContext {
    pub fn new(tenant_id: Option<i64>, principal_id: Option<i64>) -> Self {
        Self { tenant_id, principal_id, input: RequestInput::default() }
    }

    pub fn with_input(mut self, input: RequestInput) -> Self {
        self.input = input;
        self
    }
}
