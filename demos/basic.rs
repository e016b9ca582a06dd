//! CRUD-style JSON endpoints with access lines written through `tracing`.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/42
//!   curl http://localhost:3000/nowhere        ← logged at error level
//!   curl http://localhost:3000/logo.png       ← not logged

use http::StatusCode;
use tsu_access_log::middleware::access_log::{AccessLog, TracingSink};
use tsu_access_log::{Request, Response, Router, Server};

#[tokio::main]
async fn main() -> Result<(), tsu_access_log::Error> {
    tracing_subscriber::fmt::init();

    let access_log = AccessLog::builder(TracingSink)
        .format(r#":remote-addr ":method :url" :status :content-length :response-time ms ":user-agent""#)
        .skip_pattern(r"\.(gif|jpe?g|png)$")?
        .build();

    let app = Router::new()
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .delete("/users/{id}", delete_user)
        .get("/{file}", |_req: Request| async { StatusCode::NO_CONTENT })
        .wrap(access_log);

    Server::bind("0.0.0.0:3000").serve(app).await
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(br#"{"id":"99","name":"new_user"}"#.to_vec())
}

async fn delete_user(_req: Request) -> Response {
    Response::status(StatusCode::NO_CONTENT)
}
