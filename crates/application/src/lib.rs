#![forbid(unsafe_code)]

pub mod conntrack_service_impl;
