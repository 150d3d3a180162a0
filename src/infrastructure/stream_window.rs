// OR View window backed by a streaming HTTP response
use crate::application::mirror_store::MirrorStore;
use crate::application::sync_bridge::{ChildWindow, SyncError};
use crate::domain::sync_message::SyncMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub const WINDOW_BUFFER: usize = 64;

/// The receiving half is the response body; dropping the connection drops
/// the receiver, which is how the window "closes". Every delivered message
/// is also applied to `mirror`.
pub struct ChannelWindow {
    tx: mpsc::Sender<SyncMessage>,
    mirror: Arc<MirrorStore>,
}

impl ChannelWindow {
    pub fn open(mirror: Arc<MirrorStore>) -> (Self, mpsc::Receiver<SyncMessage>) {
        let (tx, rx) = mpsc::channel(WINDOW_BUFFER);
        (Self { tx, mirror }, rx)
    }
}

impl ChildWindow for ChannelWindow {
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn post_message(&self, message: &SyncMessage) -> Result<(), SyncError> {
        match self.tx.try_send(message.clone()) {
            Ok(()) => {
                self.mirror.apply(message.clone());
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SyncError::Backlogged(message.kind())),
            Err(TrySendError::Closed(_)) => Err(SyncError::Closed),
        }
    }
}
