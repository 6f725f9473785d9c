mod streamable_http_client;
