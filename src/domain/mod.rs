//! Storefront domain: cart, customer form, draft order, inbound cart.
pub mod aggregates;
pub mod events;
pub mod value_objects;
