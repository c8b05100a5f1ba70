//! Campus records service: students, lecturers and libraries behind a
//! cache-aside layer, with JWT sessions guarding every mutation.

pub mod audit;
pub mod cache;
pub mod cache_aside;
pub mod config;
pub mod db;
pub mod error;
pub mod respond;
pub mod routes;
pub mod state;
pub mod store;
pub mod tasks;

pub mod models {
    pub mod account;
    pub mod lecturer;
    pub mod library;
    pub mod principal;
    pub mod student;
}

pub mod repositories {
    pub mod account;
    pub mod document;
    pub mod library;
    pub mod memory;
    pub mod student;
}

pub mod services {
    pub mod auth;
    pub mod token;
}

pub mod handlers {
    pub mod auth;
    pub mod lecturers;
    pub mod libraries;
    pub mod students;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
    pub mod records;
}
