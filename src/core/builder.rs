use std::time::Duration;

use crate::core::address::Address;
use crate::core::Client;
use crate::proto::error::Error;

/// Builder for configuring and creating a [`Client`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use disquer::ClientBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new()
///     .address("disque://localhost:7711")
///     .auto_reconnect(true)
///     .read_timeout(Some(Duration::from_secs(5)))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    address: Option<String>,
    auto_reconnect: bool,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address, in any form [`Address::parse`] understands.
    #[inline]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Enables or disables the single automatic reconnect-and-retry on a
    /// closed connection. Off by default.
    #[inline]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Sets the connection establishment deadline.
    #[inline]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the reply read deadline. `None` means no deadline. An elapsed
    /// read deadline closes the connection.
    #[inline]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the request write deadline. `None` means no deadline.
    #[inline]
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Builds the [`Client`], opening the connection.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if no address was set; otherwise whatever
    /// connecting yields.
    #[inline]
    pub async fn build(self) -> crate::Result<Client> {
        let address = self.address.ok_or_else(|| Error::InvalidArgument {
            message: "address is required".to_string(),
        })?;
        let address = Address::parse(&address)?;
        Client::connect_inner(
            address,
            self.auto_reconnect,
            self.connect_timeout,
            self.read_timeout,
            self.write_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_new() {
        let builder = ClientBuilder::new();
        assert!(builder.address.is_none());
        assert!(!builder.auto_reconnect);
    }

    #[test]
    fn test_builder_chaining() {
        let builder = ClientBuilder::new()
            .address("disque://localhost:7711")
            .auto_reconnect(true)
            .connect_timeout(Duration::from_secs(1))
            .read_timeout(Some(Duration::from_secs(5)));

        assert_eq!(
            builder.address,
            Some("disque://localhost:7711".to_string())
        );
        assert!(builder.auto_reconnect);
        assert_eq!(builder.connect_timeout, Some(Duration::from_secs(1)));
        assert_eq!(builder.read_timeout, Some(Duration::from_secs(5)));
        assert_eq!(builder.write_timeout, None);
    }

    #[tokio::test]
    async fn test_builder_build_without_address() {
        let result = ClientBuilder::new().build().await;
        match result {
            Err(Error::InvalidArgument { message }) => {
                assert_eq!(message, "address is required");
            }
            _ => panic!("expected InvalidArgument error"),
        }
    }

    #[tokio::test]
    async fn test_builder_build_with_bad_address() {
        let result = ClientBuilder::new().address("http://nope").build().await;
        assert!(matches!(result, Err(Error::Address { .. })));
    }
}
