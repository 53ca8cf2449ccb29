pub mod link;
pub mod login;
pub mod manager;

pub use link::{HouseLink, LinkError};
pub use login::{AuthError, LoginHandler, UserLogin};
pub use manager::{ConnectError, ControlManager};
