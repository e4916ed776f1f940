use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::http::HeaderMap;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::AppError;

pub const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";

/// Longest single path component most filesystems accept.
const MAX_NAME_LEN: usize = 255;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Source of the random stem used for stored image names.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

pub struct RandomUuid;

impl IdSource for RandomUuid {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Clone)]
pub struct ImagePaths {
    ids: Arc<dyn IdSource>,
}

impl ImagePaths {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self { ids }
    }

    pub fn random() -> Self {
        Self::new(Arc::new(RandomUuid))
    }

    /// `uploads/recipe/<id>.<ext>`, keeping only the extension of the
    /// client's filename. Without an extension the dot is dropped too.
    pub fn generate_path(&self, original_filename: &str) -> String {
        let id = self.ids.next_id();
        match original_filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!("{RECIPE_UPLOAD_DIR}/{id}.{ext}"),
            _ => format!("{RECIPE_UPLOAD_DIR}/{id}"),
        }
    }
}

impl Default for ImagePaths {
    fn default() -> Self {
        Self::random()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Bmp,
    Tiff,
}

impl ImageFormat {
    fn codec(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::WebP => image::ImageFormat::WebP,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Identify an image by its leading bytes.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageFormat::WebP),
        [b'B', b'M', _, _, _, _, _, _, _, _, _, _, _, _, ..] => Some(ImageFormat::Bmp),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some(ImageFormat::Tiff),
        _ => None,
    }
}

pub struct ImageUpload {
    pub file_name: String,
    pub format: ImageFormat,
    pub data: Bytes,
}

/// Pull the `image` file out of a multipart body and check it is an image.
pub async fn read_upload(headers: &HeaderMap, body: Bytes) -> Result<ImageUpload, AppError> {
    let boundary = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| {
            AppError::validation(
                "image",
                "The submitted data was not a file. Check the encoding type on the form.",
            )
        })?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = base_name(field.file_name().unwrap_or_default()).to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Field read error: {e}")))?;

        if data.is_empty() {
            return Err(AppError::validation("image", "The submitted file is empty."));
        }
        let format = sniff_format(&data).ok_or_else(|| AppError::validation("image", INVALID_IMAGE))?;

        let payload = data.clone();
        let decoded = tokio::task::spawn_blocking(move || decode_check(&payload, format))
            .await
            .map_err(|e| AppError::Internal(format!("image decode task: {e}")))?;
        if let Err(e) = decoded {
            tracing::debug!("Rejected {format:?} upload: {e}");
            return Err(AppError::validation("image", INVALID_IMAGE));
        }

        return Ok(ImageUpload {
            file_name,
            format,
            data,
        });
    }

    Err(AppError::validation("image", "No file was submitted."))
}

/// Decode the whole payload so truncated or corrupted files are refused.
fn decode_check(data: &[u8], format: ImageFormat) -> Result<(), image::ImageError> {
    image::load_from_memory_with_format(data, format.codec()).map(|_| ())
}

/// Last path component of a client-supplied filename.
fn base_name(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw)
}

/// Resolve a generated relative path under the media root, refusing
/// anything that would leave it or that no filesystem would accept.
pub fn resolve_media_path(media_root: &Path, relative: &str) -> Result<PathBuf, AppError> {
    let relative = Path::new(relative);
    let all_normal = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal || relative.as_os_str().is_empty() {
        return Err(AppError::validation("image", "Invalid file name."));
    }
    let too_long = relative
        .components()
        .any(|c| c.as_os_str().len() > MAX_NAME_LEN);
    if too_long {
        return Err(AppError::validation(
            "image",
            format!("Ensure this filename has at most {MAX_NAME_LEN} characters."),
        ));
    }
    Ok(media_root.join(relative))
}

pub async fn store(media_root: &Path, relative: &str, data: &[u8]) -> Result<PathBuf, AppError> {
    let target = resolve_media_path(media_root, relative)?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Internal(format!("create {}: {e}", parent.display())))?;
    }
    tokio::fs::write(&target, data)
        .await
        .map_err(|e| AppError::Internal(format!("write {}: {e}", target.display())))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedId(&'static str);

    impl IdSource for FixedId {
        fn next_id(&self) -> String {
            self.0.to_string()
        }
    }

    fn fixed() -> ImagePaths {
        ImagePaths::new(Arc::new(FixedId("test-uuid")))
    }

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn path_keeps_only_extension() {
        assert_eq!(fixed().generate_path("myimage.jpg"), "uploads/recipe/test-uuid.jpg");
        assert_eq!(
            fixed().generate_path("holiday.photo.PNG"),
            "uploads/recipe/test-uuid.PNG"
        );
    }

    #[test]
    fn path_without_extension_has_no_trailing_dot() {
        assert_eq!(fixed().generate_path("myimage"), "uploads/recipe/test-uuid");
        assert_eq!(fixed().generate_path("myimage."), "uploads/recipe/test-uuid");
        assert_eq!(fixed().generate_path(""), "uploads/recipe/test-uuid");
    }

    #[test]
    fn random_ids_differ() {
        let paths = ImagePaths::random();
        let a = paths.generate_path("a.jpg");
        let b = paths.generate_path("a.jpg");
        assert_ne!(a, b);
        let stem = a
            .strip_prefix("uploads/recipe/")
            .and_then(|s| s.strip_suffix(".jpg"))
            .unwrap();
        assert!(Uuid::parse_str(stem).is_ok());
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(sniff_format(PNG_HEADER), Some(ImageFormat::Png));
        assert_eq!(sniff_format(b"GIF89a...."), Some(ImageFormat::Gif));
        assert_eq!(sniff_format(b"RIFF\x10\0\0\0WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(sniff_format(b"II\x2A\x00rest"), Some(ImageFormat::Tiff));
        assert_eq!(sniff_format(b"not an image"), None);
        assert_eq!(sniff_format(b""), None);
    }

    #[test]
    fn media_paths_stay_under_root() {
        let root = Path::new("/srv/media");
        assert_eq!(
            resolve_media_path(root, "uploads/recipe/x.jpg").unwrap(),
            PathBuf::from("/srv/media/uploads/recipe/x.jpg")
        );
        assert!(resolve_media_path(root, "uploads/recipe/x./../../etc").is_err());
        assert!(resolve_media_path(root, "/etc/passwd").is_err());
        assert!(resolve_media_path(root, "").is_err());

        let long = fixed().generate_path(&format!("a.{}", "x".repeat(300)));
        let err = resolve_media_path(root, &long).err().unwrap();
        assert!(matches!(err, AppError::Validation(ref f) if f.get("image").is_some()));
    }

    fn multipart_headers(boundary: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            format!("multipart/form-data; boundary={boundary}").parse().unwrap(),
        );
        headers
    }

    fn multipart_body(boundary: &str, field: &str, file_name: &str, data: &[u8]) -> Bytes {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Bytes::from(body)
    }

    fn encoded(format: image::ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 80, 40]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    async fn upload(file_name: &str, data: &[u8]) -> Result<ImageUpload, AppError> {
        let body = multipart_body("XYZ", "image", file_name, data);
        read_upload(&multipart_headers("XYZ"), body).await
    }

    #[tokio::test]
    async fn reads_image_field() {
        let png = encoded(image::ImageFormat::Png);
        let uploaded = upload("cake.png", &png).await.unwrap();
        assert_eq!(uploaded.file_name, "cake.png");
        assert_eq!(uploaded.format, ImageFormat::Png);
        assert_eq!(&uploaded.data[..], &png[..]);

        let jpeg = encoded(image::ImageFormat::Jpeg);
        assert_eq!(upload("cake.jpg", &jpeg).await.unwrap().format, ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn rejects_corrupted_images() {
        let png = encoded(image::ImageFormat::Png);
        let cases: [&[u8]; 4] = [
            b"\xFF\xD8\xFFthis is not a jpeg",
            b"BM0123456789abcdef",
            PNG_HEADER,
            &png[..png.len() / 2],
        ];
        for data in cases {
            let err = upload("broken.img", data).await.err().unwrap();
            let AppError::Validation(fields) = err else {
                panic!("expected validation error for {data:?}");
            };
            assert_eq!(fields.get("image").unwrap(), [INVALID_IMAGE]);
        }
    }

    #[tokio::test]
    async fn client_directories_are_dropped_from_file_name() {
        let png = encoded(image::ImageFormat::Png);
        assert_eq!(upload("a.x/y", &png).await.unwrap().file_name, "y");
        assert_eq!(fixed().generate_path("y"), "uploads/recipe/test-uuid");
    }

    #[tokio::test]
    async fn rejects_non_image_payload() {
        let body = multipart_body("XYZ", "image", "notes.txt", b"hello");
        let err = read_upload(&multipart_headers("XYZ"), body).await.err().unwrap();
        assert!(matches!(err, AppError::Validation(ref f) if f.get("image").is_some()));
    }

    #[tokio::test]
    async fn rejects_missing_image_field() {
        let body = multipart_body("XYZ", "photo", "cake.png", PNG_HEADER);
        let err = read_upload(&multipart_headers("XYZ"), body).await.err().unwrap();
        assert!(matches!(err, AppError::Validation(_)));

        let err = read_upload(&HeaderMap::new(), Bytes::from_static(b"{}"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
