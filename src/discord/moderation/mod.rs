pub mod link_handler;
