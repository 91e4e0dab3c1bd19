pub mod archive;
pub mod ticket;
pub mod timestamp;
pub mod user;

pub use self::{
    ticket::{Card, Details},
    user::{Identity, User},
};
