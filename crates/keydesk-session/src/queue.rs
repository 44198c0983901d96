use keydesk::protocol::{RequestStatus, SignRequest};
use keydesk_signer::{SignerError, SignerErrorKind};

pub const NOTICE_DECLINED: &str = "Signature Declined";
pub const NOTICE_PENDING: &str = "Signature Pending";
pub const NOTICE_SUCCESS: &str = "Signature Succesful";
pub const NOTICE_CONTRACT_DATA: &str = "Ledger Contract Data = No";
pub const NOTICE_DEVICE_DECLINED: &str = "Ledger Signature Declined";
pub const NOTICE_UNKNOWN: &str = "Unknown Error";

/// Friendly notice shown for a failed request.
pub fn notice_for(err: &SignerError) -> String {
    match err.kind {
        SignerErrorKind::ContractDataDisabled => NOTICE_CONTRACT_DATA.to_string(),
        SignerErrorKind::DeviceDeclined => NOTICE_DEVICE_DECLINED.to_string(),
        _ if err.message.is_empty() => NOTICE_UNKNOWN.to_string(),
        _ => err.message.clone(),
    }
}

/// Sign requests queued against one signer, in arrival order.
#[derive(Debug, Default)]
pub struct RequestQueue {
    requests: Vec<SignRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, handler_id: &str) -> bool {
        self.get(handler_id).is_some()
    }

    pub fn get(&self, handler_id: &str) -> Option<&SignRequest> {
        self.requests.iter().find(|r| r.handler_id == handler_id)
    }

    /// Enqueue `req` as pending. Returns false (and leaves the queue alone)
    /// when a request with the same handler id is already queued.
    pub fn insert(&mut self, mut req: SignRequest) -> bool {
        if self.contains(&req.handler_id) {
            return false;
        }
        req.status = RequestStatus::Pending;
        self.requests.push(req);
        true
    }

    pub fn remove(&mut self, handler_id: &str) -> Option<SignRequest> {
        let pos = self
            .requests
            .iter()
            .position(|r| r.handler_id == handler_id)?;
        Some(self.requests.remove(pos))
    }

    /// Move a queued request to `status` with `notice`. Returns false when the
    /// request is not queued.
    pub fn transition(&mut self, handler_id: &str, status: RequestStatus, notice: String) -> bool {
        match self.requests.iter_mut().find(|r| r.handler_id == handler_id) {
            Some(req) => {
                req.status = status;
                req.notice = Some(notice);
                true
            }
            None => false,
        }
    }

    /// Drop every request, returning what was queued.
    pub fn clear(&mut self) -> Vec<SignRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn snapshot(&self) -> Vec<SignRequest> {
        self.requests.clone()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
