// Git access: backend capabilities, the git CLI backend, and repository validation.

pub mod backend;
pub mod gate;
pub mod worker;
