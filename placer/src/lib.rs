// placer — loop-nest aware operation placement
//
// Library root. A textual program is loaded into an arena (`resolve`),
// checked (`verify`), and rewritten with the locator (`locate`), the builder
// cursor (`builder`) and the attribute forwarder (`forward`).

pub mod ast;
pub mod builder;
pub mod diag;
pub mod forward;
pub mod id;
pub mod ir;
pub mod lexer;
pub mod locate;
pub mod loops;
pub mod parser;
pub mod report;
pub mod resolve;
pub mod rewrite;
pub mod verify;
