pub mod action;
pub mod brain;
pub mod perception;
pub mod pipeline;
