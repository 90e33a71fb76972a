// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros for consistent field names and message patterns across the application
///
/// These macros ensure:
/// - Consistent field naming conventions
/// - Appropriate logging levels for different scenarios
/// - Structured logging with context

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, request_id = $request_id:expr) => {
        tracing::debug!(
            operation = $operation,
            request_id = %$request_id,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, request_id = $request_id:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            request_id = %$request_id,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, request_id = $request_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            request_id = %$request_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

// ============================================================================
// Recovery Pipeline Logging Macros
// ============================================================================

/// Log the outcome of one pipeline stage (extraction strategy, validation, repair)
#[macro_export]
macro_rules! log_pipeline_stage {
    (success, $pipeline:expr, $stage:expr, records = $count:expr) => {
        tracing::debug!(
            component = "recovery",
            pipeline = $pipeline,
            stage = %$stage,
            records = $count,
            result = "success",
            "Pipeline stage succeeded"
        );
    };
    (failure, $pipeline:expr, $stage:expr, reason = $reason:expr) => {
        tracing::debug!(
            component = "recovery",
            pipeline = $pipeline,
            stage = %$stage,
            reason = %$reason,
            result = "failure",
            "Pipeline stage failed, falling through"
        );
    };
    (dropped, $pipeline:expr, index = $index:expr, reason = $reason:expr) => {
        tracing::warn!(
            component = "recovery",
            pipeline = $pipeline,
            record_index = $index,
            reason = %$reason,
            "Dropping unusable record"
        );
    };
    (repaired, $pipeline:expr, date = $date:expr, actual = $actual:expr, target = $target:expr) => {
        tracing::info!(
            component = "recovery",
            pipeline = $pipeline,
            date = %$date,
            actual_hours = $actual,
            target_hours = $target,
            "Rescaled task durations to meet the daily target"
        );
    };
}

// ============================================================================
// LLM Service Logging Macros
// ============================================================================

/// Log LLM service operations with provider context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, provider = $provider:expr, prompt_length = $length:expr) => {
        tracing::info!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            prompt_length = $length,
            "LLM operation started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, duration_ms = $duration:expr, response_length = $length:expr) => {
        tracing::info!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            duration_ms = $duration,
            response_length = $length,
            "LLM operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr, retry_count = $retry:expr) => {
        tracing::error!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            retry_count = $retry,
            "LLM operation failed"
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Performance Logging Macros
// ============================================================================

/// Log performance metrics with consistent structure
#[macro_export]
macro_rules! log_performance {
    ($operation:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            "Performance metrics"
        );
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}
