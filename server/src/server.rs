use std::convert::Infallible;
use warp::http::StatusCode;
use warp::Filter;

use crate::room::RoomRegistry;
use crate::session;

pub async fn run(address: std::net::SocketAddr, registry: RoomRegistry) {
    registry.spawn_idle_sweep();

    let health_route = warp::path!("health").map(|| StatusCode::OK);

    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(with_registry(registry))
        .map(|ws: warp::ws::Ws, registry: RoomRegistry| {
            ws.on_upgrade(move |socket| session::start(socket, registry))
        });

    let routes = health_route.or(ws_route);

    log::info!("Listening on {}", address);
    warp::serve(routes).run(address).await
}

fn with_registry(
    registry: RoomRegistry,
) -> impl Filter<Extract = (RoomRegistry,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}
