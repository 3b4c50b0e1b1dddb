//! Result type alias for the bridge
//!
//! This module provides a convenient Result type alias that uses BridgeError
//! as the error type.

use super::errors::BridgeError;

/// Result type alias for bridge operations
///
/// # Examples
///
/// ```
/// use smart_bridge::domain::result::Result;
/// use smart_bridge::domain::errors::BridgeError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(BridgeError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
