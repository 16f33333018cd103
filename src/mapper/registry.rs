use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::mapper::{JsonMessageMapper, MessageMapper, Publication};
use crate::error::ConfigurationError;
use crate::request::{type_name, Request};

struct MapperEntry<R: Request> {
    mapper: Arc<dyn MessageMapper<R>>,
    publication: Publication,
}

/// Request type to mapper plus publication.
#[derive(Default)]
pub struct MessageMapperRegistry {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MessageMapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R, M>(&mut self, mapper: M, publication: Publication) -> &mut Self
    where
        R: Request,
        M: MessageMapper<R> + 'static,
    {
        let entry = MapperEntry::<R> {
            mapper: Arc::new(mapper),
            publication,
        };
        self.entries.insert(TypeId::of::<R>(), Box::new(entry));
        self
    }

    pub fn register_json<R>(&mut self, publication: Publication) -> &mut Self
    where
        R: Request + Serialize + DeserializeOwned,
    {
        self.register::<R, _>(JsonMessageMapper::<R>::new(), publication)
    }

    fn entry<R: Request>(&self) -> Result<&MapperEntry<R>, ConfigurationError> {
        self.entries
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<MapperEntry<R>>())
            .ok_or(ConfigurationError::NoMapper(type_name::<R>()))
    }

    pub fn contains<R: Request>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<R>())
    }

    pub fn publication<R: Request>(&self) -> Result<&Publication, ConfigurationError> {
        Ok(&self.entry::<R>()?.publication)
    }

    pub fn mapper<R: Request>(&self) -> Result<Arc<dyn MessageMapper<R>>, ConfigurationError> {
        Ok(Arc::clone(&self.entry::<R>()?.mapper))
    }
}
