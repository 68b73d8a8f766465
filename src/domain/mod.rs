pub mod comment;
pub mod notification;
pub mod post;
pub mod social_graph;
pub mod user;
