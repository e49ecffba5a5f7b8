pub mod question;
pub mod skill;
