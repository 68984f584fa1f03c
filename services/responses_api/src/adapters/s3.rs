//! services/responses_api/src/adapters/s3.rs
//!
//! The S3 adapter, the production implementation of the `ObjectStore` port from the
//! `core` crate. Conditional writes use `If-None-Match` / `If-Match` against the ETag
//! returned by the preceding read.

use async_trait::async_trait;
use aws_sdk_s3::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client,
};
use response_store_core::ports::{
    Lookup, NewObject, ObjectStore, PortError, PortResult, StoredObject, WriteCondition,
};
use std::time::Duration;

/// S3 error codes reporting a failed write precondition.
const CONFLICT_CODES: [&str; 2] = ["PreconditionFailed", "ConditionalRequestConflict"];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ObjectStore` port on a single S3 bucket.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Creates a new `S3Store` over an existing client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Loads AWS credentials from the environment and builds the client.
    pub async fn connect(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), bucket)
    }
}

fn unexpected<E: std::error::Error>(action: &str, key: &str, err: E) -> PortError {
    PortError::Unexpected(format!("could not {} {}: {}", action, key, DisplayErrorContext(err)))
}

//=========================================================================================
// `ObjectStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> PortResult<Lookup<StoredObject>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                if err.as_service_error().map(|e| e.is_no_such_key()) == Some(true) {
                    tracing::debug!("no object at {}", key);
                    return Ok(Lookup::NotFound);
                }
                return Err(unexpected("get", key, err));
            }
        };

        let version = resp.e_tag().map(str::to_string);
        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| unexpected("read body of", key, e))?
            .into_bytes();

        Ok(Lookup::Found(StoredObject { body, version }))
    }

    #[tracing::instrument(skip(self, object), fields(bytes = object.body.len()))]
    async fn put(&self, key: &str, object: NewObject, condition: WriteCondition) -> PortResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(object.content_type)
            .body(ByteStream::from(object.body));

        for (name, value) in object.metadata {
            request = request.metadata(name, value);
        }

        request = match condition {
            WriteCondition::Unconditional => request,
            WriteCondition::IfAbsent => request.if_none_match("*"),
            WriteCondition::IfVersion(etag) => request.if_match(etag),
        };

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) if err.code().is_some_and(|code| CONFLICT_CODES.contains(&code)) => {
                tracing::warn!("conditional write rejected for {}", key);
                Err(PortError::Conflict(key.to_string()))
            }
            Err(err) => Err(unexpected("put", key, err)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| unexpected("list", prefix, e))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_string),
            );
        }

        tracing::trace!("listed {} keys", keys.len());
        Ok(keys)
    }

    #[tracing::instrument(skip(self))]
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> PortResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| unexpected("configure presigning for", key, e))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| unexpected("presign", key, e))?;

        Ok(request.uri().to_string())
    }
}
