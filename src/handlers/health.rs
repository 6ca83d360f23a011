use rocket::get;

#[get("/health")]
pub fn handle_health() -> &'static str {
    "ok"
}
