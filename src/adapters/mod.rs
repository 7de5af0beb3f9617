pub mod alertmanager;
pub mod prompt;
pub mod sal;
pub mod ssh;
