#![allow(dead_code)]

pub mod dashboard_env;
pub mod mock_service;
