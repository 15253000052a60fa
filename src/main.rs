use std::net::{IpAddr, SocketAddr};

use users_backend::{
    AppState,
    config::Config,
    database::SqliteUserStore,
    remote::HttpUserApi,
    routes,
    service::UserService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env();

    // 本地用户库
    let store = SqliteUserStore::connect(&config.database_url)
        .await
        .expect("Failed to open local user store");

    // 远程用户 API
    let remote = HttpUserApi::new(config.api_base_url.clone());

    let users = UserService::new(remote, store, config.cache_config(), config.retry_policy());

    // 定时用远程数据刷新本地库
    let refresher = users.clone();
    let refresh_interval = config.refresh_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        loop {
            ticker.tick().await;
            match refresher.refresh_local_store().await {
                Ok(count) => tracing::info!("Refresh completed, {} users stored", count),
                Err(e) => tracing::error!("Refresh failed: {}", e),
            }
        }
    });

    let router = routes::create_router::<HttpUserApi, SqliteUserStore>();

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let app = router.with_state(AppState::new(users));

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
