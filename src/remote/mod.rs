//! Remote collaborators: the call transport and file transfer.

mod transfer;
mod transport;
mod types;

pub use transfer::{fix_pluginfile, FileTransfer, HttpFileTransfer};
pub use transport::{HttpTransport, Transport};
pub use types::Site;


#[cfg(test)]
mod transport_tests;
