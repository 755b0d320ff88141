//! High-level client API.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::Transport;
use chrono::Duration;
use std::sync::Arc;
use tabledb_protocol::{
    decode_response, validate_timeout_and_poll_delay, AddReplicaRequest, GetTableRequest,
    Request, RequestSerializer, Response, SerialVersion, TableDdlOptions, TableRequest,
    TableResult, TableUsageRequest, TableUsageResult, VersionNegotiator, WireError,
    CONTENT_TYPE,
};

/// Client for the table service over a pluggable transport.
pub struct Client<T: Transport> {
    transport: T,
    negotiator: Arc<VersionNegotiator>,
    config: ClientConfig,
}

impl<T: Transport> Client<T> {
    /// Creates a new client with the given transport and configuration.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            negotiator: Arc::new(VersionNegotiator::starting_at(config.serial_version)),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the serial version the next request will be encoded with.
    pub fn serial_version(&self) -> SerialVersion {
        self.negotiator.current()
    }

    /// Returns the negotiator shared by every request of this client.
    pub fn negotiator(&self) -> Arc<VersionNegotiator> {
        self.negotiator.clone()
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Encodes, sends and decodes one request.
    ///
    /// When the service rejects the serial version, the request is encoded
    /// again at the next lower version until the floor is reached.
    pub async fn execute<R, O>(&self, request: &R) -> Result<O, ClientError>
    where
        R: Request + ?Sized,
        O: Response,
    {
        loop {
            let version = self.negotiator.current();
            let body = RequestSerializer::serialize(request, version)?;
            let deadline = request
                .timeout()
                .and_then(|t| t.to_std().ok())
                .unwrap_or_else(|| self.config.request_timeout());

            tracing::debug!(
                "Sending {} at {} ({} bytes)",
                request.opcode(),
                version,
                body.len()
            );
            let response = tokio::time::timeout(deadline, self.transport.send(CONTENT_TYPE, body))
                .await
                .map_err(|_| {
                    tracing::debug!("{} timed out after {:?}", request.opcode(), deadline);
                    ClientError::Timeout
                })??;
            tracing::debug!("Received response ({} bytes)", response.len());

            match decode_response::<O>(&response) {
                Err(e) if e.is_unsupported_protocol() => {
                    // Another in-flight request may already have stepped down.
                    let lowered = self.negotiator.downgrade_from(version)
                        || self.negotiator.current() < version;
                    if lowered {
                        tracing::debug!(
                            "Retrying {} at {}",
                            request.opcode(),
                            self.negotiator.current()
                        );
                        continue;
                    }
                    tracing::warn!("Service rejected serial version {} (floor)", version);
                    return Err(ClientError::VersionExhausted(version));
                }
                result => return result.map_err(ClientError::from),
            }
        }
    }

    fn default_compartment(&self, compartment: &mut Option<String>) {
        if compartment.is_none() {
            compartment.clone_from(&self.config.compartment);
        }
    }

    // =========================================================================
    // Table operations
    // =========================================================================

    /// Submits a DDL statement or limits change. Returns the initial status.
    pub async fn table_request(&self, request: &TableRequest) -> Result<TableResult, ClientError> {
        let mut request = request.clone();
        self.default_compartment(&mut request.options.compartment);
        self.execute(&request).await
    }

    /// Submits a table request and waits until the table reaches a terminal state.
    pub async fn table_request_and_wait(
        &self,
        request: &TableRequest,
    ) -> Result<TableResult, ClientError> {
        // Resolve the wait settings up front so a bad pair never reaches the service.
        self.wait_settings(&request.options)?;

        let result = self.table_request(request).await?;
        if result.is_terminal() {
            return Ok(result);
        }
        self.wait_for_completion(
            &result.table_name,
            result.operation_id.as_deref(),
            &request.options,
        )
        .await
    }

    /// Gets the current status of a table.
    pub async fn get_table(&self, request: &GetTableRequest) -> Result<TableResult, ClientError> {
        let mut request = request.clone();
        self.default_compartment(&mut request.compartment);
        self.execute(&request).await
    }

    /// Gets usage records for a table.
    pub async fn table_usage(
        &self,
        request: &TableUsageRequest,
    ) -> Result<TableUsageResult, ClientError> {
        let mut request = request.clone();
        self.default_compartment(&mut request.compartment);
        self.execute(&request).await
    }

    /// Adds a replica of a table in another region.
    pub async fn add_replica(
        &self,
        request: &AddReplicaRequest,
    ) -> Result<TableResult, ClientError> {
        let mut request = request.clone();
        self.default_compartment(&mut request.compartment);
        self.execute(&request).await
    }

    /// Fills in the configured wait defaults and validates the result.
    ///
    /// A defaulted poll delay is capped at the timeout, so any options that
    /// pass their own validation also pass here.
    fn wait_settings(
        &self,
        options: &TableDdlOptions,
    ) -> Result<(Duration, Duration), ClientError> {
        let timeout = options.timeout.unwrap_or_else(|| self.config.ddl_timeout());
        let poll_delay = options
            .poll_delay
            .unwrap_or_else(|| std::cmp::min(self.config.poll_delay(), timeout));
        validate_timeout_and_poll_delay(Some(timeout), Some(poll_delay))?;
        Ok((timeout, poll_delay))
    }

    /// Polls the table until it reaches a terminal state.
    ///
    /// The timeout and poll delay come from `options`, falling back to the
    /// configured defaults.
    pub async fn wait_for_completion(
        &self,
        table_name: &str,
        operation_id: Option<&str>,
        options: &TableDdlOptions,
    ) -> Result<TableResult, ClientError> {
        let (timeout, poll_delay) = self.wait_settings(options)?;

        let mut request = GetTableRequest::new(table_name);
        request.operation_id = operation_id.map(str::to_string);
        request.compartment = options.compartment.clone();

        let started = tokio::time::Instant::now();

        loop {
            let result = self.get_table(&request).await?;
            if result.is_terminal() {
                tracing::debug!("Table {} reached {:?}", table_name, result.state);
                return Ok(result);
            }

            let elapsed = Duration::from_std(started.elapsed()).unwrap_or(timeout);
            if elapsed >= timeout {
                return Err(ClientError::WaitTimeout {
                    table_name: table_name.to_string(),
                    timeout_ms: timeout.num_milliseconds(),
                });
            }

            // The last check lands on the deadline.
            let sleep_for = std::cmp::min(poll_delay, timeout - elapsed)
                .to_std()
                .map_err(|_| WireError::invalid_argument("poll delay out of range"))?;
            tracing::debug!(
                "Table {} is {:?}, polling again in {}ms",
                table_name,
                result.state,
                sleep_for.as_millis()
            );
            tokio::time::sleep(sleep_for).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;
    use tabledb_protocol::{
        ErrorCode, OpCode, RequestHeader, ResponseWriter, TableLimits, TableState, WireReader,
    };

    const CREATE: &str = "CREATE TABLE users(id INTEGER, PRIMARY KEY(id))";

    /// Replays canned responses and records every request body.
    #[derive(Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<Bytes>>,
        sent: Mutex<Vec<Bytes>>,
    }

    impl MockTransport {
        fn with_responses(responses: Vec<Bytes>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent_headers(&self) -> Vec<RequestHeader> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|body| RequestHeader::read(&mut WireReader::new(body)).unwrap())
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn send(
            &self,
            content_type: &'static str,
            body: Bytes,
        ) -> impl Future<Output = Result<Bytes, ClientError>> + Send {
            assert_eq!(content_type, "application/octet-stream");
            self.sent.lock().unwrap().push(body);
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ClientError::Transport("no response queued".into()));
            async move { response }
        }
    }

    /// Never answers.
    struct StalledTransport;

    impl Transport for StalledTransport {
        fn send(
            &self,
            _content_type: &'static str,
            _body: Bytes,
        ) -> impl Future<Output = Result<Bytes, ClientError>> + Send {
            std::future::pending()
        }
    }

    /// Rejects V3 and answers V2 with an active table, yielding once so
    /// concurrent requests interleave.
    #[derive(Default)]
    struct VersionGatedTransport {
        sent: Mutex<Vec<Bytes>>,
    }

    impl VersionGatedTransport {
        fn sent_headers(&self) -> Vec<RequestHeader> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|body| RequestHeader::read(&mut WireReader::new(body)).unwrap())
                .collect()
        }
    }

    impl Transport for VersionGatedTransport {
        fn send(
            &self,
            _content_type: &'static str,
            body: Bytes,
        ) -> impl Future<Output = Result<Bytes, ClientError>> + Send {
            let header = RequestHeader::read(&mut WireReader::new(&body)).unwrap();
            self.sent.lock().unwrap().push(body);
            let response = match header.version {
                SerialVersion::V3 => error(ErrorCode::UnsupportedProtocol, "V3 not supported"),
                SerialVersion::V2 => table(TableState::Active),
            };
            async move {
                tokio::task::yield_now().await;
                Ok(response)
            }
        }
    }

    fn table(state: TableState) -> Bytes {
        let result = TableResult {
            compartment: None,
            table_name: "users".into(),
            state,
            limits: Some(TableLimits::new(10, 10, 1)),
            schema: None,
            operation_id: Some("op-1".into()),
        };
        let mut writer = ResponseWriter::success();
        result.write(&mut writer).unwrap();
        writer.freeze()
    }

    fn error(code: ErrorCode, message: &str) -> Bytes {
        ResponseWriter::error(code, message).unwrap()
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            request_timeout_ms: 1_000,
            ddl_timeout_ms: 1_000,
            poll_delay_ms: 10,
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_table_request() {
        let transport = MockTransport::with_responses(vec![table(TableState::Creating)]);
        let client = Client::new(transport, fast_config());

        let result = client
            .table_request(&TableRequest::statement(CREATE))
            .await
            .unwrap();
        assert_eq!(result.state, TableState::Creating);
        assert_eq!(result.operation_id.as_deref(), Some("op-1"));

        let headers = client.transport.sent_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].version, SerialVersion::V3);
        assert_eq!(headers[0].opcode, OpCode::TableRequest);
    }

    #[tokio::test]
    async fn test_default_compartment_applied() {
        let transport = MockTransport::with_responses(vec![table(TableState::Active)]);
        let config = ClientConfig {
            compartment: Some("prod".into()),
            ..fast_config()
        };
        let client = Client::new(transport, config);
        client
            .get_table(&GetTableRequest::new("users"))
            .await
            .unwrap();

        let sent = client.transport.sent.lock().unwrap()[0].clone();
        let mut reader = WireReader::new(&sent);
        let header = RequestHeader::read(&mut reader).unwrap();
        let decoded = GetTableRequest::read_payload(&mut reader, &header).unwrap();
        assert_eq!(decoded.compartment.as_deref(), Some("prod"));
    }

    #[tokio::test]
    async fn test_downgrades_and_retries_on_unsupported_protocol() {
        let transport = MockTransport::with_responses(vec![
            error(ErrorCode::UnsupportedProtocol, "serial version 3 not supported"),
            table(TableState::Active),
        ]);
        let client = Client::new(transport, fast_config());

        let result = client
            .get_table(&GetTableRequest::new("users"))
            .await
            .unwrap();
        assert_eq!(result.state, TableState::Active);
        assert_eq!(client.serial_version(), SerialVersion::V2);

        let headers = client.transport.sent_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].version, SerialVersion::V3);
        assert_eq!(headers[1].version, SerialVersion::V2);
    }

    #[tokio::test]
    async fn test_version_exhausted_at_floor() {
        let transport = MockTransport::with_responses(vec![
            error(ErrorCode::UnsupportedProtocol, "nope"),
            error(ErrorCode::UnsupportedProtocol, "still nope"),
        ]);
        let client = Client::new(transport, fast_config());

        let err = client
            .get_table(&GetTableRequest::new("users"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::VersionExhausted(SerialVersion::V2)
        ));
        assert_eq!(client.transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_service_error_propagated() {
        let transport =
            MockTransport::with_responses(vec![error(ErrorCode::TableNotFound, "no table users")]);
        let client = Client::new(transport, fast_config());

        match client.get_table(&GetTableRequest::new("users")).await {
            Err(ClientError::Wire(WireError::Service { code, message })) => {
                assert_eq!(code, ErrorCode::TableNotFound);
                assert_eq!(message, "no table users");
            }
            other => panic!("expected service error, got {:?}", other),
        }
        assert_eq!(client.serial_version(), SerialVersion::V3);
    }

    #[tokio::test]
    async fn test_invalid_options_never_sent() {
        let transport = MockTransport::default();
        let client = Client::new(transport, fast_config());

        let request = TableRequest::statement(CREATE).with_options(
            TableDdlOptions::new()
                .with_timeout(Duration::seconds(1))
                .with_poll_delay(Duration::seconds(5)),
        );
        let err = client.table_request(&request).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Wire(WireError::InvalidArgument(_))
        ));
        assert!(client.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_replica_unsupported_at_v2() {
        let transport = MockTransport::default();
        let config = ClientConfig {
            serial_version: SerialVersion::V2,
            ..fast_config()
        };
        let client = Client::new(transport, config);

        let err = client
            .add_replica(&AddReplicaRequest::new("users", "eu-frankfurt-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Wire(WireError::UnsupportedFeature { .. })
        ));
        assert!(client.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let config = ClientConfig {
            request_timeout_ms: 20,
            ..fast_config()
        };
        let client = Client::new(StalledTransport, config);
        let err = client
            .get_table(&GetTableRequest::new("users"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }

    #[tokio::test]
    async fn test_table_request_and_wait() {
        let transport = MockTransport::with_responses(vec![
            table(TableState::Creating),
            table(TableState::Creating),
            table(TableState::Active),
        ]);
        let client = Client::new(transport, fast_config());

        let request = TableRequest::statement(CREATE).with_options(
            TableDdlOptions::new()
                .with_timeout(Duration::seconds(5))
                .with_poll_delay(Duration::milliseconds(5)),
        );
        let result = client.table_request_and_wait(&request).await.unwrap();
        assert_eq!(result.state, TableState::Active);

        let headers = client.transport.sent_headers();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].opcode, OpCode::TableRequest);
        assert_eq!(headers[1].opcode, OpCode::GetTable);
        assert_eq!(headers[2].opcode, OpCode::GetTable);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let responses = (0..20).map(|_| table(TableState::Updating)).collect();
        let transport = MockTransport::with_responses(responses);
        let client = Client::new(transport, fast_config());

        let options = TableDdlOptions::new()
            .with_timeout(Duration::milliseconds(50))
            .with_poll_delay(Duration::milliseconds(20));
        let err = client
            .wait_for_completion("users", Some("op-1"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::WaitTimeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_default_poll_delay_capped_at_timeout() {
        let transport = MockTransport::with_responses(vec![
            table(TableState::Creating),
            table(TableState::Active),
        ]);
        // Default config polls every second.
        let client = Client::new(transport, ClientConfig::default());

        let request = TableRequest::statement(CREATE)
            .with_options(TableDdlOptions::new().with_timeout(Duration::milliseconds(50)));
        let result = client.table_request_and_wait(&request).await.unwrap();
        assert_eq!(result.state, TableState::Active);
        assert_eq!(client.transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_wait_settings_never_sent() {
        let transport = MockTransport::with_responses(vec![table(TableState::Creating)]);
        let client = Client::new(transport, fast_config());

        // Explicit poll delay longer than the configured DDL timeout.
        let request = TableRequest::statement(CREATE)
            .with_options(TableDdlOptions::new().with_poll_delay(Duration::seconds(5)));
        let err = client.table_request_and_wait(&request).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Wire(WireError::InvalidArgument(_))
        ));
        assert!(client.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wait_with_extreme_durations() {
        let transport = MockTransport::with_responses(vec![table(TableState::Updating)]);
        let client = Client::new(transport, fast_config());

        let options = TableDdlOptions::new()
            .with_timeout(Duration::MAX)
            .with_poll_delay(Duration::MAX);
        let err = client
            .wait_for_completion("users", None, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Wire(WireError::InvalidArgument(_))
        ));
        assert!(client.transport.sent.lock().unwrap().is_empty());

        // A poll delay equal to the timeout checks once more at the deadline.
        let responses = (0..3).map(|_| table(TableState::Updating)).collect();
        let client = Client::new(MockTransport::with_responses(responses), fast_config());
        let interval = Duration::milliseconds(30);
        let options = TableDdlOptions::new()
            .with_timeout(interval)
            .with_poll_delay(interval);
        let err = client
            .wait_for_completion("users", None, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::WaitTimeout { timeout_ms: 30, .. }));
        assert_eq!(client.transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_downgrade() {
        let client = Client::new(VersionGatedTransport::default(), fast_config());

        let request = GetTableRequest::new("users");
        let (a, b) = tokio::join!(client.get_table(&request), client.get_table(&request));
        assert_eq!(a.unwrap().state, TableState::Active);
        assert_eq!(b.unwrap().state, TableState::Active);
        assert_eq!(client.serial_version(), SerialVersion::V2);

        // Both requests went out at V3 before either saw the rejection, and
        // each was retried exactly once at V2.
        let versions: Vec<_> = client
            .transport
            .sent_headers()
            .iter()
            .map(|h| h.version)
            .collect();
        assert_eq!(
            versions,
            vec![
                SerialVersion::V3,
                SerialVersion::V3,
                SerialVersion::V2,
                SerialVersion::V2
            ]
        );
    }
}
