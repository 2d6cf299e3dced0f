use orrery_scene::TextureKey;

/// Failures building the scene renderers.
#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("texture '{0}' was not uploaded")]
    MissingTexture(TextureKey),
}
