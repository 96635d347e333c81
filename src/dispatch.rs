//! Controller command dispatch.
//!
//! Requests arrive from the controller by token, possibly on a processor
//! other than the one running the target thread. They are only queued here;
//! the thread's own processor applies them on its next poll.

use crate::context::VmExitContext;
use crate::debugger::UserDebugger;
use crate::error::Error;
use crate::mailbox::{ActionKind, PendingAction};
use crate::ops::UdOps;
use crate::packet::CommandPacket;
use crate::pause;
use crate::session::ThreadDebuggingSession;

impl<O: UdOps> UserDebugger<O> {
    /// Queue a controller command for the session named by its token.
    ///
    /// Never blocks: a full mailbox is reported instead of waited on.
    pub fn dispatch_command(&self, request: &CommandPacket) -> Result<(), Error> {
        if !self.is_active() {
            return Err(Error::Inactive);
        }

        let token = request.token();
        let session = self
            .registry()
            .find_by_token(token)
            .ok_or(Error::UnknownToken(token))?;

        if !request.action.is_enqueueable() {
            return Err(Error::InvalidAction(request.action.kind));
        }

        match session.mailbox().push(&request.action) {
            Some(slot) => {
                log::debug!(
                    "udbg: queued action {} for token={} (slot {})",
                    request.action.kind,
                    token,
                    slot
                );
                Ok(())
            }
            None => {
                log::debug!("udbg: mailbox full for token={}", token);
                Err(Error::MailboxFull(token))
            }
        }
    }

    /// Perform one user-mode command on a paused thread.
    ///
    /// Returns `false` for kinds this build does not know.
    pub fn perform_command<C: VmExitContext + ?Sized>(
        &self,
        session: &ThreadDebuggingSession,
        action: &PendingAction,
        ctx: &mut C,
    ) -> bool {
        match action.action() {
            Some(ActionKind::Continue) => {
                pause::continue_thread(session, ctx);
                log::debug!("udbg: token={} continued", session.token());
                true
            }
            _ => {
                log::warn!(
                    "udbg: invalid user action {} for token={}",
                    action.kind,
                    session.token()
                );
                false
            }
        }
    }
}
