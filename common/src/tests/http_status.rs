// Unit tests for HTTP status classification

use crate::HttpStatusCode;

/// **VALUE**: Only a literal 200 counts as a usable configuration response.
///
/// **BUG THIS CATCHES**: Would catch `is_ok()` being widened to the whole 2xx range,
/// which would let `204 No Content` replace the configuration snapshot.
#[test]
fn given_2xx_codes_when_is_ok_called_then_only_200_passes() {
    // GIVEN: A handful of success codes
    let codes = [200u16, 201, 204];

    // WHEN: Classifying them
    let ok: Vec<bool> = codes.iter().map(|c| HttpStatusCode(*c).is_ok()).collect();

    // THEN: Only 200 is ok
    assert_eq!(ok, vec![true, false, false]);
}

#[test]
fn given_zero_status_when_classified_then_is_no_response() {
    // GIVEN/WHEN: The placeholder for "request never completed"
    let status = HttpStatusCode::NO_RESPONSE;

    // THEN: It is neither a client nor a server error
    assert!(status.is_no_response());
    assert!(!status.is_client_error());
    assert!(!status.is_server_error());
}

#[test]
fn given_503_when_serialized_then_is_plain_number() {
    // GIVEN: A status code inside an event payload
    let status = HttpStatusCode::from(503);

    // WHEN: Serializing it
    let json = serde_json::to_string(&status).unwrap();

    // THEN: It serializes transparently, as a bare number
    assert_eq!(json, "503");
}
