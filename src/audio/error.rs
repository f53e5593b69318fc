use thiserror::Error;

/// Fallos al convertir una entrada diferida en una dirección reproducible.
///
/// Nunca son fatales: el controlador salta la entrada y sigue con la cola.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no se encontraron resultados")]
    NotFound,
    #[error("entrada mal formada: {0}")]
    Malformed(String),
    #[error("error del proveedor: {0}")]
    Provider(String),
}

/// Errores del núcleo de reproducción, todos acotados a una sesión y una operación.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("no se pudo resolver la canción: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("no se pudo conectar al canal de voz: {0}")]
    Connection(String),

    #[error("fallo en el stream de audio: {0}")]
    Pipeline(String),

    /// La señal llegó para una sesión o stream que ya no existe.
    #[error("sesión obsoleta")]
    StaleSession,

    /// El actor de la sesión terminó antes de procesar el mensaje.
    #[error("la sesión ya fue cerrada")]
    SessionClosed,
}

impl PlaybackError {
    /// Indica si el llamador puede reintentar contra una sesión nueva.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlaybackError::SessionClosed)
    }
}
