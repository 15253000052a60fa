use database::{SqliteUserStore, UserStore};
use remote::{HttpUserApi, UserSource};
use service::UserService;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod remote;
pub mod routes;
pub mod service;
pub mod storage;

pub struct AppState<R = HttpUserApi, S = SqliteUserStore> {
    pub users: UserService<R, S>,
}

impl<R, S> Clone for AppState<R, S> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
        }
    }
}

impl<R: UserSource, S: UserStore> AppState<R, S> {
    pub fn new(users: UserService<R, S>) -> Self {
        Self { users }
    }
}
