pub mod encrypt;
pub mod show;
pub mod watch;
