mod http_status;
mod redacted_token;
