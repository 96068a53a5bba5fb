pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod responder;
pub mod router;
pub mod validation;
