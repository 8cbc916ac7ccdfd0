#[cfg(test)]
mod tests {
    use axum::http::Method;

    use crate::error::AppError;
    use crate::middleware::auth::Principal;
    use crate::policy::{check_book_access, is_safe_method, may_modify};

    fn principal(id: i64, is_staff: bool) -> Principal {
        Principal { id, username: format!("user{}", id), is_staff }
    }

    #[test]
    fn test_safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::PUT));
        assert!(!is_safe_method(&Method::PATCH));
        assert!(!is_safe_method(&Method::DELETE));
    }

    #[test]
    fn test_reads_always_allowed() {
        assert!(check_book_access(&Method::GET, None, Some(1)).is_ok());
        assert!(check_book_access(&Method::GET, Some(&principal(2, false)), Some(1)).is_ok());
    }

    #[test]
    fn test_writes_need_a_principal() {
        let err = check_book_access(&Method::PUT, None, Some(1)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_owner_and_staff_may_write() {
        assert!(check_book_access(&Method::PUT, Some(&principal(1, false)), Some(1)).is_ok());
        assert!(check_book_access(&Method::DELETE, Some(&principal(2, true)), Some(1)).is_ok());
        assert!(check_book_access(&Method::PATCH, Some(&principal(2, true)), None).is_ok());
    }

    #[test]
    fn test_others_are_denied() {
        let err = check_book_access(&Method::PUT, Some(&principal(2, false)), Some(1)).unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
        assert!(!may_modify(&principal(2, false), None));
    }
}
