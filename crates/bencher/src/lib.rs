//! Shared fixtures for the texa benchmarks.

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    request: RawRequest,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, request: RawRequest) -> Self {
        Self { name, group, request }
    }

    pub fn small(name: &'static str, request: RawRequest) -> Self {
        Self::new(name, TestGroup::Small, request)
    }

    pub fn large(name: &'static str, request: RawRequest) -> Self {
        Self::new(name, TestGroup::Large, request)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn request(&self) -> &RawRequest {
        &self.request
    }
}

/// The bytes of one request as a client puts them on the wire.
#[derive(Debug, Copy, Clone)]
pub struct RawRequest {
    content: &'static str,
}

impl RawRequest {
    pub const fn new(content: &'static str) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}

pub static SMALL_GET: RawRequest = RawRequest::new(concat!(
    "GET /chat HTTP/1.1\r\n",
    "Host: 127.0.0.1:4000\r\n",
    "User-Agent: curl/8.7.1\r\n",
    "Accept: */*\r\n",
    "\r\n",
));

pub static LARGE_GET: RawRequest = RawRequest::new(concat!(
    "GET /users/42/posts?page=3&sort=desc HTTP/1.1\r\n",
    "Host: 127.0.0.1:4000\r\n",
    "Connection: keep-alive\r\n",
    "Cache-Control: max-age=0\r\n",
    "sec-ch-ua: \"Chromium\";v=\"128\", \"Not;A=Brand\";v=\"24\"\r\n",
    "sec-ch-ua-mobile: ?0\r\n",
    "sec-ch-ua-platform: \"macOS\"\r\n",
    "Upgrade-Insecure-Requests: 1\r\n",
    "User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36\r\n",
    "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8\r\n",
    "Sec-Fetch-Site: none\r\n",
    "Sec-Fetch-Mode: navigate\r\n",
    "Sec-Fetch-User: ?1\r\n",
    "Sec-Fetch-Dest: document\r\n",
    "Accept-Encoding: gzip, deflate, br, zstd\r\n",
    "Accept-Language: en-US,en;q=0.9\r\n",
    "Cookie: session=8f2b1c7e0d9a4f36b5e1a2c3d4e5f607; theme=dark; lang=en\r\n",
    "\r\n",
));

pub static JSON_POST: RawRequest = RawRequest::new(concat!(
    "POST /api/users HTTP/1.1\r\n",
    "Host: 127.0.0.1:4000\r\n",
    "Content-Type: application/json\r\n",
    "Content-Length: 27\r\n",
    "\r\n",
    "{\"name\":\"texa\",\"age\":1234}\n",
));
