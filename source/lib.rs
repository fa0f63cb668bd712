// https://www.rfc-editor.org/rfc/rfc3501 - IMAP4rev1
// https://www.rfc-editor.org/rfc/rfc2177 - IMAP4 IDLE command
// https://www.rfc-editor.org/rfc/rfc2595 - Using TLS with IMAP, POP3 and ACAP (STARTTLS)
// https://www.rfc-editor.org/rfc/rfc2971 - IMAP4 ID extension
// https://www.rfc-editor.org/rfc/rfc3691 - UNSELECT command
// https://www.rfc-editor.org/rfc/rfc4315 - IMAP UIDPLUS extension
// https://www.rfc-editor.org/rfc/rfc4422 - Simple Authentication and Security Layer (SASL)
// https://www.rfc-editor.org/rfc/rfc4551 - IMAP extension for conditional STORE (CONDSTORE)
// https://www.rfc-editor.org/rfc/rfc4959 - IMAP SASL-IR extension
// https://www.rfc-editor.org/rfc/rfc6851 - IMAP MOVE extension
// https://www.rfc-editor.org/rfc/rfc7162 - Quick Mailbox Resynchronization (QRESYNC/CONDSTORE)
// https://www.rfc-editor.org/rfc/rfc7888 - IMAP4 Non-Synchronizing Literals (LITERAL+)

#![allow(clippy::upper_case_acronyms)]

mod codec;
mod command;
mod error;
mod framer;
mod parser;
pub mod session;
pub mod transport;
mod types;

pub use command::{FetchItem, SearchCriteria, StoreOp};
pub use error::{Error, Result};
pub use parser::{FetchAttr, MailboxListing, ResponseCode, Status, Untagged};
pub use session::{Event, Session};
pub use transport::{Connector, TcpConnector, TlsConnector, TlsStream};
pub use types::{
  Address, AppendUid, BodyStructure, Config, Credential, CopyUid, Disposition, Envelope,
  Extensions, MailboxNode, MailboxSnapshot, MailboxTree, Message, MessageCounts, Part, Range,
  Section, SessionState, StatusAttrs, TlsMode, TlsOptions,
};
