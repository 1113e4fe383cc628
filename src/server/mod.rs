pub mod builds;
pub mod dto;
pub mod hooks;
mod html;
pub mod links;
pub mod negotiate;
pub mod pagination;
pub mod projects;
pub mod repr;
pub mod response;
mod router;
pub mod tags;
pub mod validation;

pub use router::{AppState, create_router};
