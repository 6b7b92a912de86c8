//! Asset kind classification.
//!
//! Maps a file extension onto the coarse [`AssetType`] buckets the asset
//! index stores and the browser groups by. The table is fixed; anything
//! unmapped is `Unknown`, and directory entries are always `Directory`
//! regardless of their name.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coarse classification of an indexed filesystem entry.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum AssetType {
	Texture,
	Model,
	Sound,
	Font,
	Shader,
	Document,
	Archive,
	Directory,
	Unknown,
}

impl AssetType {
	/// Classify a file extension, case-insensitively.
	///
	/// Accepts the extension with or without its leading dot, so both
	/// `"png"` and `".PNG"` map to [`AssetType::Texture`].
	pub fn from_extension(extension: &str) -> Self {
		let ext = extension.trim_start_matches('.').to_ascii_lowercase();
		match ext.as_str() {
			"png" | "jpg" | "jpeg" | "bmp" | "tga" | "dds" | "hdr" | "exr" | "ktx" => Self::Texture,
			"fbx" | "obj" | "dae" | "3ds" | "blend" | "max" | "ma" | "mb" | "c4d" => Self::Model,
			"wav" | "mp3" | "ogg" | "flac" | "aac" | "m4a" => Self::Sound,
			"ttf" | "otf" | "woff" | "woff2" | "eot" => Self::Font,
			"vert" | "frag" | "geom" | "tesc" | "tese" | "comp" | "glsl" | "hlsl" => Self::Shader,
			"txt" | "md" | "pdf" | "doc" | "docx" => Self::Document,
			"zip" | "rar" | "7z" | "tar" | "gz" => Self::Archive,
			_ => Self::Unknown,
		}
	}
}
