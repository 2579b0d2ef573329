// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::helpers::encode_batch;
use cwl_output::ffi::{
    cwl_output_exit, cwl_output_flush, cwl_output_init, CwlError, CwlFlushStatus,
    CwlOutputOptions,
};
use mockito::Matcher;
use std::ffi::CString;
use std::ptr;

const TARGET: &str = "x-amz-target";

struct Options {
    message_key: CString,
    group_key: CString,
    stream_key: CString,
    endpoint: CString,
    log_level: CString,
}

impl Options {
    fn new(endpoint: &str) -> Self {
        Options {
            message_key: CString::new("log").unwrap(),
            group_key: CString::new("group").unwrap(),
            stream_key: CString::new("stream").unwrap(),
            endpoint: CString::new(endpoint).unwrap(),
            log_level: CString::new("debug").unwrap(),
        }
    }

    fn as_ffi(&self) -> CwlOutputOptions {
        CwlOutputOptions {
            message_key: self.message_key.as_ptr(),
            log_group_name_key: self.group_key.as_ptr(),
            log_stream_name_key: self.stream_key.as_ptr(),
            endpoint: self.endpoint.as_ptr(),
            https_proxy: ptr::null(),
            request_timeout: ptr::null(),
            max_retries: ptr::null(),
            flush_concurrency: ptr::null(),
            discovery_attempts: ptr::null(),
            log_level: self.log_level.as_ptr(),
        }
    }
}

#[test]
fn test_init_flush_exit_against_service() {
    let mut server = mockito::Server::new();
    let describe = server
        .mock("POST", "/")
        .match_header(TARGET, "Logs_20140328.DescribeLogStreams")
        .with_status(200)
        .with_body(r#"{"logStreams":[]}"#)
        .create();
    let create = server
        .mock("POST", "/")
        .match_header(TARGET, "Logs_20140328.CreateLogStream")
        .match_body(Matcher::PartialJsonString(
            r#"{"logGroupName":"app","logStreamName":"web-1"}"#.to_string(),
        ))
        .with_status(200)
        .create();
    let put = server
        .mock("POST", "/")
        .match_header(TARGET, "Logs_20140328.PutLogEvents")
        .match_body(Matcher::PartialJsonString(
            r#"{"logEvents":[{"timestamp":1000,"message":"hello"}]}"#.to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"nextSequenceToken":"t1"}"#)
        .create();

    let options = Options::new(&server.url());
    let result = unsafe { cwl_output_init(&options.as_ffi()) };
    assert_eq!(result.error, CwlError::Ok);
    assert!(!result.output.is_null());

    let data = encode_batch(&[(1, "hello", "app", "web-1")]);
    let status = unsafe { cwl_output_flush(result.output, data.as_ptr(), data.len()) };
    assert_eq!(status, CwlFlushStatus::Ok);

    describe.assert();
    create.assert();
    put.assert();

    let status = unsafe { cwl_output_flush(result.output, ptr::null(), 0) };
    assert_eq!(status, CwlFlushStatus::Ok);

    assert_eq!(unsafe { cwl_output_exit(result.output) }, CwlError::Ok);
}

#[test]
fn test_flush_reports_failed_destination() {
    let mut server = mockito::Server::new();
    let _describe = server
        .mock("POST", "/")
        .match_header(TARGET, "Logs_20140328.DescribeLogStreams")
        .with_status(200)
        .with_body(r#"{"logStreams":[{"logStreamName":"web-1","uploadSequenceToken":"t0"}]}"#)
        .create();
    let _put = server
        .mock("POST", "/")
        .match_header(TARGET, "Logs_20140328.PutLogEvents")
        .with_status(400)
        .with_body(r#"{"__type":"InvalidSequenceTokenException","expectedSequenceToken":"t5"}"#)
        .create();

    let options = Options::new(&server.url());
    let result = unsafe { cwl_output_init(&options.as_ffi()) };
    assert_eq!(result.error, CwlError::Ok);

    let data = encode_batch(&[(1, "hello", "app", "web-1")]);
    let status = unsafe { cwl_output_flush(result.output, data.as_ptr(), data.len()) };
    assert_eq!(status, CwlFlushStatus::Error);

    assert_eq!(unsafe { cwl_output_exit(result.output) }, CwlError::Ok);
}

#[test]
fn test_missing_required_key_fails_init() {
    let options = Options::new("http://127.0.0.1:1");
    let mut ffi_options = options.as_ffi();
    ffi_options.message_key = ptr::null();

    let result = unsafe { cwl_output_init(&ffi_options) };

    assert!(result.output.is_null());
    assert_eq!(result.error, CwlError::ConfigError);
}
