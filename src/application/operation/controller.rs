//! Operation Controller

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::messages::{render_failure, GENERIC_FAILURE_MESSAGE};
use super::state::{ConcurrencyPolicy, OperationPhase, OperationState};
use crate::application::ports::{GatewayError, WatermarkServicePort};
use crate::domain::{
    LengthSuggestion, OperationKind, OperationOutcome, OperationRequest, OperationResult,
    RequestError,
};

/// 操作控制器
///
/// 每个实例持有一份 `OperationState`。新操作开始时原子地清空上一次的结果和错误，
/// 因此不同操作的结果不会混在一起。预期内的失败都转成 `last_error`，
/// 只有调用方契约违反会通过 `Err` 返回。
pub struct OperationController {
    gateway: Arc<dyn WatermarkServicePort>,
    policy: ConcurrencyPolicy,
    state: Mutex<OperationState>,
}

impl OperationController {
    pub fn new(gateway: Arc<dyn WatermarkServicePort>) -> Self {
        Self {
            gateway,
            policy: ConcurrencyPolicy::default(),
            state: Mutex::new(OperationState::idle()),
        }
    }

    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 当前状态快照
    pub fn state(&self) -> OperationState {
        self.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn last_result(&self) -> Option<OperationResult> {
        self.lock().last_result.clone()
    }

    /// 执行一次操作并返回结算后的状态
    ///
    /// 请求不合法时立即返回 `Err`，不改变状态，也不发出网络请求。
    pub async fn run(&self, request: OperationRequest) -> Result<OperationState, RequestError> {
        request.validate()?;

        let kind = request.kind();
        let (operation_id, started_at) = self.begin(kind)?;

        tracing::debug!(operation_id = %operation_id, operation = %kind, "Operation started");
        let outcome = self.dispatch(request).await;

        Ok(self.settle(operation_id, kind, started_at, outcome))
    }

    /// 长度建议
    ///
    /// 不经过 pending/settled 生命周期，不影响控制器状态。
    /// 服务不可达时返回网关的降级结果；其他失败只记录日志并返回 None。
    pub async fn suggest_length(&self, text: &str) -> Option<LengthSuggestion> {
        if text.trim().is_empty() {
            return None;
        }

        match self.gateway.suggest_length(text).await {
            Ok(suggestion) => Some(suggestion),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get length suggestion");
                None
            }
        }
    }

    /// 清空结果和错误；进行中的操作保持 pending
    pub fn clear_results(&self) {
        let mut state = self.lock();
        state.last_result = None;
        state.last_error = None;
        if state.phase != OperationPhase::Pending {
            state.phase = OperationPhase::Idle;
        }
    }

    fn lock(&self) -> MutexGuard<'_, OperationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 进入 pending，同时清空上一次的结果和错误
    fn begin(&self, kind: OperationKind) -> Result<(Uuid, DateTime<Utc>), RequestError> {
        let mut state = self.lock();

        if self.policy == ConcurrencyPolicy::RejectWhilePending && state.is_loading() {
            let running = state
                .kind
                .map(|k| k.as_str())
                .unwrap_or("unknown");
            tracing::warn!(operation = %kind, running = %running, "Rejected, operation in flight");
            return Err(RequestError::OperationInFlight(running.to_string()));
        }

        let operation_id = Uuid::new_v4();
        let started_at = Utc::now();
        *state = OperationState {
            phase: OperationPhase::Pending,
            last_result: None,
            last_error: None,
            operation_id: Some(operation_id),
            kind: Some(kind),
            started_at: Some(started_at),
            settled_at: None,
        };
        Ok((operation_id, started_at))
    }

    async fn dispatch(&self, request: OperationRequest) -> Result<OperationResult, GatewayError> {
        match request {
            OperationRequest::AddWatermark {
                image,
                text,
                method,
            } => self.gateway.add_watermark(&image, &text, &method).await,
            OperationRequest::DetectWatermark {
                image,
                expected_text,
                method,
            } => {
                self.gateway
                    .detect_watermark(&image, &expected_text, &method)
                    .await
            }
            OperationRequest::ScanWatermarks {
                image,
                method,
                max_length,
                verbose,
            } => {
                self.gateway
                    .scan_watermarks(&image, &method, max_length, verbose)
                    .await
            }
            OperationRequest::ExtractWatermark {
                image,
                method,
                length,
            } => self.gateway.extract_watermark(&image, &method, length).await,
            OperationRequest::SuggestLength { text } => {
                let suggestion = self.gateway.suggest_length(&text).await?;
                if suggestion.success {
                    Ok(OperationResult::succeeded(
                        suggestion.message.clone(),
                        OperationOutcome::LengthSuggestion(suggestion),
                    ))
                } else {
                    Ok(OperationResult::failed(suggestion.message))
                }
            }
        }
    }

    /// 写入结算结果
    ///
    /// 传输层成功但 `success = false` 的结果同样走错误分支。
    /// 标识字段整体替换为本次操作的，快照不会混入更新操作的时间戳。
    fn settle(
        &self,
        operation_id: Uuid,
        kind: OperationKind,
        started_at: DateTime<Utc>,
        outcome: Result<OperationResult, GatewayError>,
    ) -> OperationState {
        let mut state = self.lock();

        if state.operation_id != Some(operation_id) {
            tracing::debug!(
                operation_id = %operation_id,
                current = ?state.operation_id,
                "Settling over a newer operation"
            );
        }

        match outcome {
            Ok(result) if result.success() => {
                tracing::info!(operation_id = %operation_id, operation = %kind, "Operation succeeded");
                state.phase = OperationPhase::SettledOk;
                state.last_result = Some(result);
                state.last_error = None;
            }
            Ok(result) => {
                let message = if result.message().trim().is_empty() {
                    GENERIC_FAILURE_MESSAGE.to_string()
                } else {
                    result.message().to_string()
                };
                tracing::warn!(
                    operation_id = %operation_id,
                    operation = %kind,
                    message = %message,
                    "Operation rejected by service"
                );
                state.phase = OperationPhase::SettledError;
                state.last_result = None;
                state.last_error = Some(message);
            }
            Err(e) => {
                tracing::warn!(
                    operation_id = %operation_id,
                    operation = %kind,
                    error = %e,
                    "Operation failed"
                );
                state.phase = OperationPhase::SettledError;
                state.last_result = None;
                state.last_error = Some(render_failure(&e));
            }
        }

        state.operation_id = Some(operation_id);
        state.kind = Some(kind);
        state.started_at = Some(started_at);
        state.settled_at = Some(Utc::now());
        state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::operation::{UNAVAILABLE_MESSAGE, VALIDATION_MESSAGE};
    use crate::application::ports::{HealthReport, HealthStatus};
    use crate::domain::{Detection, EmbeddingMethod, ImagePayload};
    use async_trait::async_trait;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// 按脚本返回结果并记录调用次数的网关
    struct ScriptedGateway {
        reachable: bool,
        response: Mutex<Result<OperationResult, GatewayError>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedGateway {
        fn new(response: Result<OperationResult, GatewayError>) -> Self {
            Self {
                reachable: true,
                response: Mutex::new(response),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn unreachable() -> Self {
            Self {
                reachable: false,
                ..Self::new(Err(GatewayError::ServiceUnavailable))
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn set_response(&self, response: Result<OperationResult, GatewayError>) {
            *self.response.lock().unwrap() = response;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// 只有第一次调用会等待 gate
        async fn respond(&self) -> Result<OperationResult, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let (0, Some(gate)) = (call, &self.gate) {
                gate.notified().await;
            }
            if !self.reachable {
                return Err(GatewayError::ServiceUnavailable);
            }
            self.response.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WatermarkServicePort for ScriptedGateway {
        async fn probe_health(&self) -> HealthStatus {
            HealthStatus {
                reachable: self.reachable,
                message: String::new(),
            }
        }

        async fn health_check(&self) -> HealthReport {
            HealthReport::unhealthy("scripted")
        }

        async fn add_watermark(
            &self,
            _image: &ImagePayload,
            _text: &str,
            _method: &EmbeddingMethod,
        ) -> Result<OperationResult, GatewayError> {
            self.respond().await
        }

        async fn detect_watermark(
            &self,
            _image: &ImagePayload,
            _expected_text: &str,
            _method: &EmbeddingMethod,
        ) -> Result<OperationResult, GatewayError> {
            self.respond().await
        }

        async fn scan_watermarks(
            &self,
            _image: &ImagePayload,
            _method: &EmbeddingMethod,
            _max_length: u32,
            _verbose: bool,
        ) -> Result<OperationResult, GatewayError> {
            self.respond().await
        }

        async fn extract_watermark(
            &self,
            _image: &ImagePayload,
            _method: &EmbeddingMethod,
            _length: Option<NonZeroU32>,
        ) -> Result<OperationResult, GatewayError> {
            self.respond().await
        }

        async fn suggest_length(&self, text: &str) -> Result<LengthSuggestion, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.reachable {
                return Ok(LengthSuggestion::fallback(text, "unavailable"));
            }
            Ok(LengthSuggestion {
                success: true,
                message: "ok".to_string(),
                recommended_length: 64,
                suggested_lengths: vec![32, 64],
                degraded: false,
            })
        }

        fn download_reference(&self, filename: &str) -> Result<String, RequestError> {
            Ok(format!("http://test/api/download/{}", filename))
        }

        fn api_base(&self) -> &str {
            "http://test"
        }
    }

    fn image() -> ImagePayload {
        ImagePayload::new("photo.jpg", vec![0xFF, 0xD8, 0xFF]).unwrap()
    }

    fn detection(confidence: f64) -> OperationResult {
        OperationResult::succeeded(
            "detected",
            OperationOutcome::Detection(Detection {
                has_watermark: true,
                confidence,
                decoded_content: None,
            }),
        )
    }

    fn controller(gateway: Arc<ScriptedGateway>) -> OperationController {
        OperationController::new(gateway)
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_state_change() {
        let gateway = Arc::new(ScriptedGateway::new(Ok(detection(0.5))));
        let controller = controller(gateway.clone());

        let result = controller.run(OperationRequest::add(image(), "")).await;

        assert_eq!(result.unwrap_err(), RequestError::EmptyText);
        assert_eq!(controller.state(), OperationState::idle());
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_detect_settles_ok() {
        let gateway = Arc::new(ScriptedGateway::new(Ok(detection(0.87))));
        let controller = controller(gateway.clone());

        let state = controller
            .run(OperationRequest::detect(image(), "Copyright 2024"))
            .await
            .unwrap();

        assert_eq!(state.phase, OperationPhase::SettledOk);
        assert!(state.last_error.is_none());
        let detection = state.last_result.as_ref().and_then(|r| r.detection()).unwrap();
        assert!(detection.has_watermark);
        assert_eq!(detection.confidence, 0.87);
        assert_eq!(state.kind, Some(OperationKind::DetectWatermark));
        assert!(state.settled_at.is_some());
        assert!(!controller.is_loading());
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_logical_failure_routes_to_error() {
        let gateway = Arc::new(ScriptedGateway::new(Ok(OperationResult::failed(
            "图片尺寸太小",
        ))));
        let controller = controller(gateway);

        let state = controller
            .run(OperationRequest::add(image(), "mark"))
            .await
            .unwrap();

        assert_eq!(state.phase, OperationPhase::SettledError);
        assert_eq!(state.last_error.as_deref(), Some("图片尺寸太小"));
        assert!(state.last_result.is_none());
    }

    #[tokio::test]
    async fn test_blank_failure_message_gets_generic_text() {
        let gateway = Arc::new(ScriptedGateway::new(Ok(OperationResult::failed(""))));
        let controller = controller(gateway);

        controller
            .run(OperationRequest::scan(image()))
            .await
            .unwrap();
        assert_eq!(controller.last_error().as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_validation_status_renders_parameter_error() {
        let gateway = Arc::new(ScriptedGateway::new(Err(GatewayError::Transport {
            status: 422,
            body: String::new(),
        })));
        let controller = controller(gateway);

        for request in [
            OperationRequest::add(image(), "mark"),
            OperationRequest::detect(image(), "mark"),
            OperationRequest::scan(image()),
        ] {
            let state = controller.run(request).await.unwrap();
            assert_eq!(state.phase, OperationPhase::SettledError);
            assert_eq!(state.last_error.as_deref(), Some(VALIDATION_MESSAGE));
        }
    }

    #[tokio::test]
    async fn test_unavailable_service() {
        let gateway = Arc::new(ScriptedGateway::unreachable());
        let controller = controller(gateway);

        let state = controller
            .run(OperationRequest::extract(image(), None))
            .await
            .unwrap();
        assert_eq!(state.phase, OperationPhase::SettledError);
        assert_eq!(state.last_error.as_deref(), Some(UNAVAILABLE_MESSAGE));
        assert!(state.last_result.is_none());
    }

    #[tokio::test]
    async fn test_new_run_clears_previous_result() {
        let gateway = Arc::new(ScriptedGateway::new(Ok(detection(0.9))));
        let controller = controller(gateway.clone());

        let first = controller
            .run(OperationRequest::detect(image(), "mark"))
            .await
            .unwrap();
        assert!(first.last_result.is_some());

        gateway.set_response(Err(GatewayError::Timeout));
        let second = controller
            .run(OperationRequest::detect(image(), "mark"))
            .await
            .unwrap();
        assert!(second.last_result.is_none());
        assert!(second.last_error.is_some());
        assert_ne!(first.operation_id, second.operation_id);
    }

    #[tokio::test]
    async fn test_pending_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(ScriptedGateway::new(Ok(detection(0.7))).gated(gate.clone()));
        let controller = controller(gateway.clone()).arc();

        let running = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .run(OperationRequest::detect(image(), "mark"))
                    .await
            })
        };

        while gateway.calls() == 0 {
            tokio::task::yield_now().await;
        }
        let pending = controller.state();
        assert!(pending.is_loading());
        assert!(pending.last_result.is_none());
        assert!(pending.last_error.is_none());

        gate.notify_one();
        let settled = running.await.unwrap().unwrap();
        assert_eq!(settled.phase, OperationPhase::SettledOk);
    }

    #[tokio::test]
    async fn test_slow_operation_settling_last_keeps_its_own_identity() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(ScriptedGateway::new(Ok(detection(0.7))).gated(gate.clone()));
        let controller = controller(gateway.clone()).arc();

        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .run(OperationRequest::detect(image(), "mark"))
                    .await
            })
        };
        while gateway.calls() == 0 {
            tokio::task::yield_now().await;
        }
        let slow_pending = controller.state();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let fast = controller
            .run(OperationRequest::scan(image()))
            .await
            .unwrap();
        assert_eq!(fast.kind, Some(OperationKind::ScanWatermarks));
        assert_ne!(fast.started_at, slow_pending.started_at);

        gate.notify_one();
        let settled = slow.await.unwrap().unwrap();
        assert_eq!(settled.operation_id, slow_pending.operation_id);
        assert_eq!(settled.kind, Some(OperationKind::DetectWatermark));
        assert_eq!(settled.started_at, slow_pending.started_at);
        assert!(settled.settled_at >= settled.started_at);
        assert_eq!(controller.state(), settled);
    }

    #[tokio::test]
    async fn test_reject_while_pending() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(ScriptedGateway::new(Ok(detection(0.7))).gated(gate.clone()));
        let controller = controller(gateway.clone())
            .with_policy(ConcurrencyPolicy::RejectWhilePending)
            .arc();

        let running = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.run(OperationRequest::scan(image())).await })
        };
        while gateway.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let before = controller.state();
        let rejected = controller
            .run(OperationRequest::detect(image(), "mark"))
            .await;
        assert_eq!(
            rejected.unwrap_err(),
            RequestError::OperationInFlight("scan".to_string())
        );
        assert_eq!(controller.state(), before);
        assert_eq!(gateway.calls(), 1);

        gate.notify_one();
        running.await.unwrap().unwrap();
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn test_suggest_length_bypasses_lifecycle() {
        let gateway = Arc::new(ScriptedGateway::unreachable());
        let controller = controller(gateway.clone());

        let suggestion = controller.suggest_length("Copyright 2024").await.unwrap();
        assert!(!suggestion.success);
        assert_eq!(suggestion.recommended_length, 14);
        assert_eq!(controller.state(), OperationState::idle());

        assert!(controller.suggest_length("   ").await.is_none());
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_suggest_length_through_run() {
        let gateway = Arc::new(ScriptedGateway::new(Ok(detection(0.1))));
        let controller = controller(gateway);

        let state = controller
            .run(OperationRequest::suggest_length("Copyright 2024"))
            .await
            .unwrap();
        assert_eq!(state.phase, OperationPhase::SettledOk);
        match state.last_result.as_ref().and_then(|r| r.outcome()) {
            Some(OperationOutcome::LengthSuggestion(s)) => assert_eq!(s.recommended_length, 64),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_results() {
        let gateway = Arc::new(ScriptedGateway::new(Err(GatewayError::Network(
            "refused".into(),
        ))));
        let controller = controller(gateway);

        controller
            .run(OperationRequest::scan(image()))
            .await
            .unwrap();
        assert!(controller.last_error().is_some());

        controller.clear_results();
        let state = controller.state();
        assert_eq!(state.phase, OperationPhase::Idle);
        assert!(state.last_error.is_none());
        assert!(state.last_result.is_none());
    }
}
