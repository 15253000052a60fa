mod handler;
mod model;

use axum::{Router, routing::get};

use crate::AppState;
use crate::database::UserStore;
use crate::remote::UserSource;

pub use handler::{create_user, delete_user, get_user, list_users, update_user};
pub use model::{UserIdPath, UserRequest};

// 用户相关的路由
pub fn user_routes<R: UserSource, S: UserStore>() -> Router<AppState<R, S>> {
    Router::new()
        .route("/users", get(list_users::<R, S>).post(create_user::<R, S>))
        .route(
            "/users/{id}",
            get(get_user::<R, S>)
                .put(update_user::<R, S>)
                .delete(delete_user::<R, S>),
        )
}
