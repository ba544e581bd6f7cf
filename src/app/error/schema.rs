#[derive(serde::Serialize)]
pub struct Error {
    pub success: bool,
    pub message: String,
}
