pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
pub const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;
/// Generated images smaller than this are treated as failed generations
pub const MIN_GENERATED_IMAGE_BYTES: usize = 1000;
pub const GENERATED_IMAGE_SIZE: u32 = 1024;

pub const UPLOAD_FIELD: &str = "image";
pub const UPLOAD_PREFIX: &str = "uploads";

pub const NO_IMAGE_ERROR: &str = "No image file provided";
pub const UPLOAD_FAILED_ERROR: &str = "Failed to upload image. Please try again.";
pub const GENERATE_FAILED_ERROR: &str = "Failed to generate image. Please try again.";
pub const IMAGE_TOO_SMALL_ERROR: &str = "Generated image is too small. Please try again.";
pub const BACKEND_UNREACHABLE_ERROR: &str = "Failed to connect to image generation server.";
pub const NON_IMAGE_RESPONSE_ERROR: &str = "Image generation failed. Server returned non-image response.";

pub const HERO_HEADER: &str = "x-hero";
pub const STYLE_HEADER: &str = "x-style";
